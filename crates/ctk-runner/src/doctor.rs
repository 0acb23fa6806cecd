use anyhow::{anyhow, Result};
use ctk_core::ExecutionMode;
use ctk_exec::{CommandRunner, CommandSpec};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolStatus {
    pub tool: &'static str,
    /// First line of the version output when the tool answered.
    pub version: Option<String>,
}

pub type Tool = (&'static str, &'static [&'static str]);

const DIRECT_TOOLS: &[Tool] = &[("kubectl", &["version", "--client"]), ("yq", &["--version"])];
const MANAGED_TOOLS: &[Tool] = &[("gcloud", &["--version"]), ("tkn", &["version"]), ("yq", &["--version"])];

/// CLIs a mode shells out to, with the arguments that print their version.
pub fn required_tools(mode: ExecutionMode) -> &'static [Tool] {
    match mode {
        ExecutionMode::Direct => DIRECT_TOOLS,
        ExecutionMode::Managed => MANAGED_TOOLS,
    }
}

pub fn doctor(runner: &dyn CommandRunner, mode: ExecutionMode) -> Result<Vec<ToolStatus>> {
    let mut statuses = Vec::new();
    for &(tool, args) in required_tools(mode) {
        let version = match runner.run(&CommandSpec::new(tool).args(args.iter().copied())) {
            Ok(out) if out.success => Some(out.stdout.lines().next().unwrap_or_default().trim().to_string()),
            _ => None,
        };
        statuses.push(ToolStatus { tool, version });
    }

    let missing: Vec<&str> = statuses.iter().filter(|s| s.version.is_none()).map(|s| s.tool).collect();
    if !missing.is_empty() {
        return Err(anyhow!("{} mode needs {} on PATH", mode, missing.join(", ")));
    }
    Ok(statuses)
}
