use std::path::Path;

use ctk_core::{Completion, Result, RunLifecycle, Scope, TektonRun};
use ctk_fixture::StagedFixture;
use ctk_strategy::{RunStrategy, WaitSpec};
use tracing::{info, warn};

/// A submitted run and how it ended.
#[derive(Clone, Debug)]
pub struct RunRecord {
    pub run: TektonRun,
    pub completion: Completion,
}

/// Drives one manifest through `Created → Submitted → Watching → terminal` on a strategy.
pub struct RunController<'a> {
    strategy: &'a dyn RunStrategy,
    wait: WaitSpec,
}

impl<'a> RunController<'a> {
    pub fn new(strategy: &'a dyn RunStrategy, wait: WaitSpec) -> Self {
        Self { strategy, wait }
    }

    pub fn execute(&self, scope: &Scope, fixture: &StagedFixture, manifest: &Path) -> Result<RunRecord> {
        let mut lifecycle = RunLifecycle::new();

        let run = self.strategy.submit(scope, fixture, manifest)?;
        lifecycle.submitted(run.clone())?;
        lifecycle.watching()?;
        info!(scope = %scope.id, run = %run, timeout = ?self.wait.timeout, condition = %self.wait.condition, "watching run");

        let outcome = self.strategy.wait(scope, &run, &self.wait)?;
        lifecycle.finish(outcome.clone())?;
        info!(scope = %scope.id, run = %run, outcome = %outcome, "run finished");

        let logs = if outcome.is_success() {
            None
        } else {
            match self.strategy.collect_logs(scope, &run) {
                Ok(logs) => Some(logs),
                Err(e) => {
                    warn!(scope = %scope.id, run = %run, error = %e, "could not collect logs");
                    None
                }
            }
        };
        Ok(RunRecord { run, completion: Completion { outcome, logs } })
    }
}
