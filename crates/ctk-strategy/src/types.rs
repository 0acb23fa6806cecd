use std::fmt;
use std::path::Path;
use std::time::Duration;

use ctk_core::conditions::SUCCEEDED;
use ctk_core::{ExecutionMode, Result, Scope, StepState, TektonRun, WaitOutcome};
use ctk_fixture::StagedFixture;

pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(600);

/// One undo step registered when a remote resource is created.
pub struct Finalizer {
    pub label: String,
    action: Box<dyn FnOnce() -> Result<()> + Send>,
}

impl Finalizer {
    pub fn new(label: impl Into<String>, action: impl FnOnce() -> Result<()> + Send + 'static) -> Self {
        Self { label: label.into(), action: Box::new(action) }
    }

    pub fn run(self) -> Result<()> {
        (self.action)()
    }
}

impl fmt::Debug for Finalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Finalizer").field("label", &self.label).finish_non_exhaustive()
    }
}

/// How long to wait and which condition must turn true.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WaitSpec {
    pub timeout: Duration,
    pub condition: String,
}

impl Default for WaitSpec {
    fn default() -> Self {
        Self { timeout: DEFAULT_WAIT_TIMEOUT, condition: SUCCEEDED.to_string() }
    }
}

/// One way of running Tekton work: straight against a cluster, or through a managed build API.
///
/// Resource-creating calls hand back the finalizers that undo them; callers own their ordering.
pub trait RunStrategy: Send + Sync {
    fn mode(&self) -> ExecutionMode;

    fn open_scope(&self, scope: &Scope) -> Result<Vec<Finalizer>>;

    fn install_step_action(&self, scope: &Scope, fixture: &StagedFixture) -> Result<Vec<Finalizer>>;

    fn submit(&self, scope: &Scope, fixture: &StagedFixture, manifest: &Path) -> Result<TektonRun>;

    fn wait(&self, scope: &Scope, run: &TektonRun, wait: &WaitSpec) -> Result<WaitOutcome>;

    /// Run document as YAML, for field queries.
    fn fetch_document(&self, scope: &Scope, run: &TektonRun) -> Result<String>;

    fn step_states(&self, scope: &Scope, run: &TektonRun) -> Result<Vec<StepState>>;

    fn collect_logs(&self, scope: &Scope, run: &TektonRun) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn finalizer_runs_once_with_its_label() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let f = Finalizer::new("delete namespace x", move || {
            h.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        assert!(format!("{f:?}").contains("delete namespace x"));
        f.run().unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn default_wait_is_ten_minutes_on_succeeded() {
        let w = WaitSpec::default();
        assert_eq!(w.timeout, Duration::from_secs(600));
        assert_eq!(w.condition, "Succeeded");
    }
}
