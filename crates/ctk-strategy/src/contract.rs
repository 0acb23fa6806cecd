use std::time::Duration;

use ctk_core::{Error, Result, Scope};
use ctk_fixture::StagedFixture;

use crate::types::{RunStrategy, WaitSpec};

/// Shared strategy contract suite. Drives one fresh scope through open, install,
/// submit, wait and teardown, and expects the first test manifest to succeed.
pub fn run_strategy_contract(strategy: &dyn RunStrategy, fixture: &StagedFixture) -> Result<Scope> {
    let scope = Scope::new(strategy.mode());
    let mut finalizers = strategy.open_scope(&scope)?;
    finalizers.extend(strategy.install_step_action(&scope, fixture)?);

    let manifest = fixture.tests.first().ok_or_else(|| Error::Parse("fixture has no test manifests".into()))?;
    let run = strategy.submit(&scope, fixture, manifest)?;
    let outcome = strategy.wait(&scope, &run, &WaitSpec { timeout: Duration::from_secs(5), ..Default::default() })?;
    if !outcome.is_success() {
        return Err(Error::Assertion(format!("expected {run} to succeed, got {outcome}")));
    }
    if strategy.fetch_document(&scope, &run)?.trim().is_empty() {
        return Err(Error::Assertion(format!("expected a document for {run}")));
    }

    for finalizer in finalizers.into_iter().rev() {
        finalizer.run()?;
    }
    Ok(scope)
}
