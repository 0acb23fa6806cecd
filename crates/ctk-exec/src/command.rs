use std::time::Duration;

use ctk_core::{Error, Result};

use crate::stream::ProcessStream;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<String>,
    pub env: Vec<(String, String)>,
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into(), ..Default::default() }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn command_line(&self) -> String {
        if self.args.is_empty() {
            return self.program.clone();
        }
        format!("{} {}", self.program, self.args.join(" "))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// stdout followed by stderr, the way a human reads a failed CLI call.
    pub fn combined(&self) -> String {
        match (self.stdout.trim_end().is_empty(), self.stderr.trim_end().is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr),
        }
    }
}

/// Seam for every external CLI call so strategies can be exercised without a cluster.
pub trait CommandRunner: Send + Sync {
    /// Runs to completion. Non-zero exit is reported in the output, not as an error.
    fn run(&self, cmd: &CommandSpec) -> Result<CommandOutput>;

    /// Spawns and hands back stdout as it is produced.
    fn stream(&self, cmd: &CommandSpec) -> Result<ProcessStream>;

    fn run_checked(&self, cmd: &CommandSpec) -> Result<CommandOutput> {
        let out = self.run(cmd)?;
        if !out.success {
            return Err(Error::CommandFailed { command: cmd.command_line(), output: out.combined() });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_args() {
        let cmd = CommandSpec::new("kubectl").arg("apply").args(["-f", "x.yaml"]).stdin("doc");
        assert_eq!(cmd.command_line(), "kubectl apply -f x.yaml");
        assert_eq!(cmd.stdin.as_deref(), Some("doc"));
    }

    #[test]
    fn combined_output_keeps_both_streams() {
        let out = CommandOutput { success: false, exit_code: Some(1), stdout: "a\n".into(), stderr: "b\n".into() };
        assert_eq!(out.combined(), "a\nb\n");
        let only_err = CommandOutput { stderr: "boom".into(), ..Default::default() };
        assert_eq!(only_err.combined(), "boom");
    }
}
