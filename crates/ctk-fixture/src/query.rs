use ctk_core::Result;
use ctk_exec::{CommandRunner, CommandSpec};

/// Evaluates yq expressions against YAML text.
pub struct FieldExtractor<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> FieldExtractor<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    /// `yq eval <expr> -` with the document on stdin. A missing field comes back as `null`.
    pub fn extract(&self, yaml: &str, expr: &str) -> Result<String> {
        let cmd = CommandSpec::new("yq").args(["eval", expr, "-"]).stdin(yaml);
        let out = self.runner.run_checked(&cmd)?;
        Ok(out.stdout.trim().to_string())
    }
}
