use std::panic::{catch_unwind, AssertUnwindSafe};

use ctk_core::{Result, Scope};
use ctk_fixture::StagedFixture;
use ctk_strategy::{Finalizer, RunStrategy};
use tracing::{debug, info, warn};

/// What teardown did. Failures never stop the remaining finalizers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub completed: Vec<String>,
    /// `(finalizer label, error)`
    pub failed: Vec<(String, String)>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Owns one execution scope and the finalizers that tear it down.
///
/// Finalizers run newest first on `release`, or on drop if the holder never released,
/// so teardown also happens when a test body returns early or panics.
pub struct ScopeGuard<'a> {
    strategy: &'a dyn RunStrategy,
    scope: Scope,
    finalizers: Vec<Finalizer>,
    released: bool,
}

impl<'a> ScopeGuard<'a> {
    pub fn acquire(strategy: &'a dyn RunStrategy) -> Result<Self> {
        let scope = Scope::new(strategy.mode());
        let finalizers = strategy.open_scope(&scope)?;
        info!(scope = %scope.id, mode = %scope.mode, "scope acquired");
        Ok(Self { strategy, scope, finalizers, released: false })
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn register(&mut self, finalizer: Finalizer) {
        debug!(scope = %self.scope.id, finalizer = %finalizer.label, "finalizer registered");
        self.finalizers.push(finalizer);
    }

    pub fn install_step_action(&mut self, fixture: &StagedFixture) -> Result<()> {
        for finalizer in self.strategy.install_step_action(&self.scope, fixture)? {
            self.register(finalizer);
        }
        Ok(())
    }

    pub fn release(mut self) -> CleanupReport {
        self.teardown()
    }

    fn teardown(&mut self) -> CleanupReport {
        self.released = true;
        let mut report = CleanupReport::default();
        while let Some(finalizer) = self.finalizers.pop() {
            let label = finalizer.label.clone();
            let result = catch_unwind(AssertUnwindSafe(|| finalizer.run()));
            match result {
                Ok(Ok(())) => {
                    debug!(scope = %self.scope.id, finalizer = %label, "finalizer done");
                    report.completed.push(label);
                }
                Ok(Err(e)) => {
                    warn!(scope = %self.scope.id, finalizer = %label, error = %e, "finalizer failed");
                    report.failed.push((label, e.to_string()));
                }
                Err(_) => {
                    warn!(scope = %self.scope.id, finalizer = %label, "finalizer panicked");
                    report.failed.push((label, "panicked".to_string()));
                }
            }
        }
        info!(scope = %self.scope.id, failed = report.failed.len(), "scope released");
        report
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        if !self.released {
            let report = self.teardown();
            if !report.is_clean() {
                warn!(scope = %self.scope.id, failed = ?report.failed, "teardown on drop left resources behind");
            }
        }
    }
}
