use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ctk_core::{Error, ExecutionMode, Result, Scope, StepState, TektonRun, WaitOutcome};
use ctk_exec::{CommandRunner, CommandSpec};
use ctk_fixture::{Manifest, ManagedDocument, StagedFixture};
use ctk_strategy::{Finalizer, RunStrategy, WaitSpec};
use tracing::{debug, info};

use crate::poll::poll_until;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManagedSettings {
    pub project: String,
    pub region: String,
    /// Artifact Registry repository StepAction bundles are pushed to.
    pub registry: String,
    pub service_account: String,
    pub name_prefix: String,
    pub poll_interval: Duration,
}

/// Runs tests through the Cloud Build v2 runs API, with StepActions resolved from pushed bundles.
#[derive(Clone)]
pub struct ManagedStrategy {
    runner: Arc<dyn CommandRunner>,
    settings: ManagedSettings,
}

impl ManagedStrategy {
    pub fn new(runner: Arc<dyn CommandRunner>, settings: ManagedSettings) -> Self {
        Self { runner, settings }
    }

    pub fn settings(&self) -> &ManagedSettings {
        &self.settings
    }

    /// `<registry>/<step action>:<scope id>`
    pub fn bundle_ref(&self, scope: &Scope, fixture: &StagedFixture) -> String {
        format!("{}/{}:{}", self.settings.registry.trim_end_matches('/'), fixture.step_action_name, scope.id)
    }

    fn location_args(&self) -> [String; 2] {
        [format!("--project={}", self.settings.project), format!("--region={}", self.settings.region)]
    }

    fn describe(&self, run: &TektonRun, format: &str, budget: Option<Duration>) -> Result<String> {
        let mut cmd = CommandSpec::new("gcloud")
            .args(["builds", "runs", "describe", run.name.as_str()])
            .args(self.location_args())
            .arg(format!("--format={format}"));
        if let Some(budget) = budget {
            cmd = cmd.timeout(budget);
        }
        Ok(self.runner.run_checked(&cmd)?.stdout)
    }

    fn managed_file(manifest: &Path) -> PathBuf {
        let stem = manifest.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_else(|| "run".into());
        manifest.with_file_name(format!("{stem}.managed.yaml"))
    }
}

impl RunStrategy for ManagedStrategy {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Managed
    }

    fn open_scope(&self, scope: &Scope) -> Result<Vec<Finalizer>> {
        // Runs are isolated by name; nothing to create up front.
        debug!(scope = %scope.id, "managed scope opened");
        Ok(Vec::new())
    }

    fn install_step_action(&self, scope: &Scope, fixture: &StagedFixture) -> Result<Vec<Finalizer>> {
        let oci = self.bundle_ref(scope, fixture);
        let file = fixture.step_action.display().to_string();
        self.runner.run_checked(&CommandSpec::new("tkn").args(["bundle", "push", oci.as_str(), "-f", file.as_str()]))?;
        info!(bundle = %oci, "StepAction bundle pushed");

        let delete = CommandSpec::new("gcloud").args([
            "artifacts",
            "docker",
            "images",
            "delete",
            oci.as_str(),
            "--delete-tags",
            "--quiet",
        ]);
        let runner = self.runner.clone();
        Ok(vec![Finalizer::new(format!("delete bundle {oci}"), move || runner.run_checked(&delete).map(|_| ()))])
    }

    fn submit(&self, scope: &Scope, fixture: &StagedFixture, manifest: &Path) -> Result<TektonRun> {
        let oci = self.bundle_ref(scope, fixture);
        let document = ManagedDocument {
            name_prefix: &self.settings.name_prefix,
            service_account: &self.settings.service_account,
            bundle: Some((fixture.step_action_name.as_str(), oci.as_str())),
        };
        let (prepared, run) = document.prepare(&Manifest::load(manifest)?, &scope.id)?;
        let file = Self::managed_file(manifest);
        prepared.save(&file)?;

        let cmd = CommandSpec::new("gcloud")
            .args(["builds", "runs", "apply"])
            .arg(format!("--file={}", file.display()))
            .arg(format!("--region={}", self.settings.region))
            .arg(format!("--project={}", self.settings.project));
        self.runner.run_checked(&cmd)?;
        info!(run = %run, project = %self.settings.project, region = %self.settings.region, "run submitted");
        Ok(run)
    }

    fn wait(&self, _scope: &Scope, run: &TektonRun, wait: &WaitSpec) -> Result<WaitOutcome> {
        Ok(poll_until(|left| self.describe(run, "json", Some(left)), self.settings.poll_interval, wait.timeout))
    }

    fn fetch_document(&self, _scope: &Scope, run: &TektonRun) -> Result<String> {
        self.describe(run, "yaml", None)
    }

    fn step_states(&self, _scope: &Scope, run: &TektonRun) -> Result<Vec<StepState>> {
        Err(Error::Unsupported(format!("step results are not reported by the managed runs API ({run})")))
    }

    /// The runs API exposes no pod logs; the described run, conditions included, is the diagnostic.
    fn collect_logs(&self, _scope: &Scope, run: &TektonRun) -> Result<String> {
        self.describe(run, "yaml", None)
    }
}
