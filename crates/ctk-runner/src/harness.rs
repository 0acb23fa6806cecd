use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ctk_core::{TektonRun, WaitOutcome};
use ctk_exec::CommandRunner;
use ctk_fixture::{random_suffix, stage_fixture, StagedFixture};
use ctk_strategy::{RunStrategy, WaitSpec};
use tracing::{error, info, warn};

use crate::assert::RunAssertions;
use crate::controller::{RunController, RunRecord};
use crate::expect::{Check, ExpectedOutcome, Expectations, FieldCheck, StepResultCheck};
use crate::scope::{CleanupReport, ScopeGuard};

/// Result of one test manifest.
#[derive(Clone, Debug, Default)]
pub struct CaseReport {
    pub name: String,
    pub run: Option<TektonRun>,
    pub outcome: Option<WaitOutcome>,
    pub logs: Option<String>,
    pub failures: Vec<String>,
    pub cleanup: CleanupReport,
}

impl CaseReport {
    pub fn passed(&self) -> bool {
        self.failures.is_empty() && self.cleanup.is_clean()
    }
}

impl fmt::Display for CaseReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.passed() { "PASS" } else { "FAIL" };
        write!(f, "{verdict} {}", self.name)?;
        if let Some(outcome) = &self.outcome {
            write!(f, " ({outcome})")?;
        }
        for failure in &self.failures {
            write!(f, "\n    {failure}")?;
        }
        for (label, err) in &self.cleanup.failed {
            write!(f, "\n    cleanup `{label}`: {err}")?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct TestReport {
    pub step_action: String,
    pub cases: Vec<CaseReport>,
}

impl TestReport {
    pub fn passed(&self) -> bool {
        self.cases.iter().all(CaseReport::passed)
    }

    pub fn failed_count(&self) -> usize {
        self.cases.iter().filter(|c| !c.passed()).count()
    }
}

/// Runs every test manifest of a StepAction fixture, each in its own scope.
pub struct CatalogTest<'a> {
    strategy: &'a dyn RunStrategy,
    runner: &'a dyn CommandRunner,
    wait: WaitSpec,
    suffix: Option<String>,
}

impl<'a> CatalogTest<'a> {
    pub fn new(strategy: &'a dyn RunStrategy, runner: &'a dyn CommandRunner, wait: WaitSpec) -> Self {
        Self { strategy, runner, wait, suffix: None }
    }

    /// Fixed suffix instead of a random one.
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    pub fn run(&self, fixture_dir: &Path) -> Result<TestReport> {
        let work = tempfile::Builder::new().prefix("ctk-").tempdir().context("create staging directory")?;
        let suffix = self.suffix.clone().unwrap_or_else(random_suffix);
        let staged = stage_fixture(fixture_dir, work.path(), &suffix)
            .with_context(|| format!("stage fixture {}", fixture_dir.display()))?;

        let mut report = TestReport { step_action: staged.step_action_name.clone(), cases: Vec::new() };
        if staged.tests.is_empty() {
            warn!(fixture = %fixture_dir.display(), "no tests/*.yaml to run");
        }
        for (manifest, source) in staged.tests.iter().zip(source_tests(fixture_dir, &staged)) {
            let case = self.run_case(&staged, manifest, &source);
            if case.passed() {
                info!(case = %case.name, "test passed");
            } else {
                error!(case = %case.name, failures = ?case.failures, "test failed");
            }
            report.cases.push(case);
        }
        Ok(report)
    }

    fn run_case(&self, staged: &StagedFixture, manifest: &Path, source: &Path) -> CaseReport {
        let name = manifest.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        let mut case = CaseReport { name, ..Default::default() };

        let expectations = match Expectations::load_for(source) {
            Ok(e) => e,
            Err(e) => {
                case.failures.push(format!("{e:#}"));
                return case;
            }
        };

        let mut guard = match ScopeGuard::acquire(self.strategy) {
            Ok(guard) => guard,
            Err(e) => {
                case.failures.push(format!("scope setup: {e}"));
                return case;
            }
        };

        let result = guard
            .install_step_action(staged)
            .and_then(|()| RunController::new(self.strategy, self.wait.clone()).execute(guard.scope(), staged, manifest));
        match result {
            Ok(record) => self.judge(&mut case, guard.scope(), &record, &expectations),
            Err(e) => case.failures.push(e.to_string()),
        }
        case.cleanup = guard.release();
        case
    }

    fn judge(&self, case: &mut CaseReport, scope: &ctk_core::Scope, record: &RunRecord, expectations: &Expectations) {
        let outcome = &record.completion.outcome;
        case.run = Some(record.run.clone());
        case.outcome = Some(outcome.clone());
        case.logs = record.completion.logs.clone();

        let as_expected = match expectations.outcome {
            ExpectedOutcome::Succeeded => outcome.is_success(),
            ExpectedOutcome::Failed => matches!(outcome, WaitOutcome::Failed { .. }),
        };
        if !as_expected {
            case.failures.push(format!("{} {outcome}, expected {:?}", record.run, expectations.outcome));
            return;
        }

        let checks = RunAssertions::new(self.strategy, self.runner, scope, &record.run);
        for check in &expectations.checks {
            let result = match check {
                Check::Field(FieldCheck { field, equals: Some(expected) }) => checks.field_equals(field, expected),
                Check::Field(FieldCheck { field, equals: None }) => checks.field_not_empty(field).map(|_| ()),
                Check::StepResult(StepResultCheck { step, result }) => {
                    checks.step_result_not_empty(step.as_deref(), result)
                }
            };
            if let Err(e) = result {
                case.failures.push(e.to_string());
            }
        }
    }
}

/// Source path of each staged test, for reading sidecar files that are not staged.
fn source_tests(fixture_dir: &Path, staged: &StagedFixture) -> Vec<PathBuf> {
    staged
        .tests
        .iter()
        .map(|t| match t.file_name() {
            Some(name) => fixture_dir.join("tests").join(name),
            None => t.clone(),
        })
        .collect()
}
