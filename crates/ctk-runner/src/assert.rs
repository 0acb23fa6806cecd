use ctk_core::{check_step_result, Error, Result, Scope, TektonRun};
use ctk_exec::CommandRunner;
use ctk_fixture::FieldExtractor;
use ctk_strategy::RunStrategy;
use tracing::debug;

/// yq renders an absent field as `null`.
fn is_empty_field(value: &str) -> bool {
    value.is_empty() || value == "null"
}

/// Post-run checks against one finished run. The document is fetched fresh for every check.
pub struct RunAssertions<'a> {
    strategy: &'a dyn RunStrategy,
    extractor: FieldExtractor<'a>,
    scope: &'a Scope,
    run: &'a TektonRun,
}

impl<'a> RunAssertions<'a> {
    pub fn new(strategy: &'a dyn RunStrategy, runner: &'a dyn CommandRunner, scope: &'a Scope, run: &'a TektonRun) -> Self {
        Self { strategy, extractor: FieldExtractor::new(runner), scope, run }
    }

    fn field(&self, expr: &str) -> Result<String> {
        let document = self.strategy.fetch_document(self.scope, self.run)?;
        let value = self.extractor.extract(&document, expr)?;
        debug!(run = %self.run, expr, value = %value, "field extracted");
        Ok(value)
    }

    /// Returns the value so callers can log or reuse it.
    pub fn field_not_empty(&self, expr: &str) -> Result<String> {
        let value = self.field(expr)?;
        if is_empty_field(&value) {
            return Err(Error::Assertion(format!("field {expr} of {} is empty", self.run)));
        }
        Ok(value)
    }

    pub fn field_equals(&self, expr: &str, expected: &str) -> Result<()> {
        let actual = self.field(expr)?;
        if actual != expected {
            return Err(Error::Assertion(format!(
                "field {expr} of {}: expected {expected:?}, got {actual:?}",
                self.run
            )));
        }
        Ok(())
    }

    pub fn step_result_not_empty(&self, step: Option<&str>, result: &str) -> Result<()> {
        let steps = self.strategy.step_states(self.scope, self.run)?;
        check_step_result(&steps, step, result)
    }
}
