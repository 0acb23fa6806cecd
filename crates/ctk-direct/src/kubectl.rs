use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ctk_core::conditions::DIRECT_TRUE;
use ctk_core::{
    parse_created_run, step_states_from_run, Error, ExecutionMode, Result, RunKind, Scope, StepState, TektonRun,
    WaitOutcome,
};
use ctk_exec::{CommandRunner, CommandSpec};
use ctk_fixture::StagedFixture;
use ctk_strategy::{Finalizer, RunStrategy, WaitSpec};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::watch::watch_until;

/// Extra time `kubectl wait` gets over its own `--timeout` before it is killed.
const KUBECTL_WAIT_SLACK: Duration = Duration::from_secs(30);

/// How the direct path waits for a run to finish.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WaitMethod {
    /// Follow watch events and judge every status update.
    #[default]
    Watch,
    /// Block in `kubectl wait --for=condition=...`.
    KubectlWait,
}

/// Image pull secret created in every test namespace and attached to its default service account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PullSecret {
    pub name: String,
    /// Docker `config.json` holding the registry credentials.
    pub docker_config: PathBuf,
}

/// Runs tests by applying manifests straight to a cluster with kubectl.
#[derive(Clone)]
pub struct DirectStrategy {
    runner: Arc<dyn CommandRunner>,
    kubeconfig: Option<PathBuf>,
    pull_secret: Option<PullSecret>,
    wait_method: WaitMethod,
}

impl DirectStrategy {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner, kubeconfig: None, pull_secret: None, wait_method: WaitMethod::default() }
    }

    pub fn with_kubeconfig(mut self, kubeconfig: Option<PathBuf>) -> Self {
        self.kubeconfig = kubeconfig;
        self
    }

    pub fn with_pull_secret(mut self, pull_secret: Option<PullSecret>) -> Self {
        self.pull_secret = pull_secret;
        self
    }

    pub fn with_wait_method(mut self, wait_method: WaitMethod) -> Self {
        self.wait_method = wait_method;
        self
    }

    fn kubectl(&self) -> CommandSpec {
        let cmd = CommandSpec::new("kubectl");
        match &self.kubeconfig {
            Some(path) => cmd.arg(format!("--kubeconfig={}", path.display())),
            None => cmd,
        }
    }

    fn delete_namespace(&self, namespace: &str) -> Finalizer {
        let cmd = self.kubectl().args(["delete", "namespace", namespace, "--ignore-not-found"]);
        let runner = self.runner.clone();
        Finalizer::new(format!("delete namespace {namespace}"), move || runner.run_checked(&cmd).map(|_| ()))
    }

    fn install_pull_secret(&self, namespace: &str, secret: &PullSecret) -> Result<()> {
        let from_file = format!("--from-file=.dockerconfigjson={}", secret.docker_config.display());
        self.runner.run_checked(&self.kubectl().args([
            "create",
            "secret",
            "docker-registry",
            secret.name.as_str(),
            from_file.as_str(),
            "-n",
            namespace,
        ]))?;
        let patch = format!(r#"{{"imagePullSecrets":[{{"name":"{}"}}]}}"#, secret.name);
        self.runner.run_checked(&self.kubectl().args([
            "patch",
            "serviceaccount",
            "default",
            "-n",
            namespace,
            "-p",
            patch.as_str(),
        ]))?;
        debug!(namespace, secret = %secret.name, "pull secret attached to default service account");
        Ok(())
    }

    fn apply(&self, file: &Path, namespace: &str) -> Result<String> {
        let file = file.display().to_string();
        let out = self.runner.run_checked(&self.kubectl().args(["apply", "-f", file.as_str(), "-n", namespace]))?;
        Ok(out.stdout)
    }

    fn get(&self, run: &TektonRun, namespace: &str, format: &str) -> Result<String> {
        let target = run.resource_ref();
        let out = self.runner.run_checked(&self.kubectl().args(["get", target.as_str(), "-n", namespace, "-o", format]))?;
        Ok(out.stdout)
    }

    fn watch(&self, scope: &Scope, run: &TektonRun, wait: &WaitSpec) -> Result<WaitOutcome> {
        let selector = format!("--field-selector=metadata.name={}", run.name);
        let request_timeout = format!("--request-timeout={}s", wait.timeout.as_secs().max(1));
        let cmd = self.kubectl().args([
            "get",
            run.kind.resource(),
            selector.as_str(),
            "-n",
            scope.namespace(),
            "--watch",
            "--output-watch-events",
            "-o",
            "json",
            request_timeout.as_str(),
        ]);
        let stream = self.runner.stream(&cmd)?;
        Ok(watch_until(stream, &wait.condition, wait.timeout))
    }

    fn kubectl_wait(&self, scope: &Scope, run: &TektonRun, wait: &WaitSpec) -> Result<WaitOutcome> {
        let condition = format!("--for=condition={}={}", wait.condition, DIRECT_TRUE);
        let timeout = format!("--timeout={}s", wait.timeout.as_secs().max(1));
        let target = run.resource_ref();
        let cmd = self
            .kubectl()
            .args(["wait", condition.as_str(), timeout.as_str(), target.as_str(), "-n", scope.namespace()])
            .timeout(wait.timeout.saturating_add(KUBECTL_WAIT_SLACK));
        let out = match self.runner.run(&cmd) {
            Ok(out) => out,
            Err(Error::CommandTimedOut { .. }) => return Ok(WaitOutcome::TimedOut { after: wait.timeout }),
            Err(e) => return Err(e),
        };
        if out.success {
            return Ok(WaitOutcome::Succeeded);
        }
        let output = out.combined();
        if output.contains("timed out waiting for the condition") {
            return Ok(WaitOutcome::TimedOut { after: wait.timeout });
        }
        Ok(WaitOutcome::Failed { reason: output.trim().to_string() })
    }
}

impl RunStrategy for DirectStrategy {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Direct
    }

    fn open_scope(&self, scope: &Scope) -> Result<Vec<Finalizer>> {
        let namespace = scope.namespace();
        self.runner.run_checked(&self.kubectl().args(["create", "namespace", namespace]))?;
        info!(namespace, "namespace created");
        let cleanup = self.delete_namespace(namespace);

        if let Some(secret) = &self.pull_secret {
            if let Err(e) = self.install_pull_secret(namespace, secret) {
                if let Err(cleanup_err) = cleanup.run() {
                    warn!(namespace, error = %cleanup_err, "namespace cleanup after failed setup");
                }
                return Err(e);
            }
        }
        Ok(vec![cleanup])
    }

    fn install_step_action(&self, scope: &Scope, fixture: &StagedFixture) -> Result<Vec<Finalizer>> {
        self.apply(&fixture.step_action, scope.namespace())?;
        info!(namespace = scope.namespace(), step_action = %fixture.step_action_name, "StepAction applied");
        // Removed with the namespace.
        Ok(Vec::new())
    }

    fn submit(&self, scope: &Scope, _fixture: &StagedFixture, manifest: &Path) -> Result<TektonRun> {
        let output = self.apply(manifest, scope.namespace())?;
        let run = parse_created_run(&output)?;
        info!(namespace = scope.namespace(), run = %run, "run submitted");
        Ok(run)
    }

    fn wait(&self, scope: &Scope, run: &TektonRun, wait: &WaitSpec) -> Result<WaitOutcome> {
        match self.wait_method {
            WaitMethod::Watch => self.watch(scope, run, wait),
            WaitMethod::KubectlWait => self.kubectl_wait(scope, run, wait),
        }
    }

    fn fetch_document(&self, scope: &Scope, run: &TektonRun) -> Result<String> {
        self.get(run, scope.namespace(), "yaml")
    }

    fn step_states(&self, scope: &Scope, run: &TektonRun) -> Result<Vec<StepState>> {
        if run.kind != RunKind::TaskRun {
            return Err(Error::Unsupported(format!("step results are only reported by TaskRuns, not {run}")));
        }
        let json = self.get(run, scope.namespace(), "json")?;
        step_states_from_run(&serde_json::from_str(&json)?)
    }

    fn collect_logs(&self, scope: &Scope, run: &TektonRun) -> Result<String> {
        let namespace = scope.namespace();
        let selector = format!("{}={}", run.kind.pod_label(), run.name);
        let pods = self
            .runner
            .run_checked(&self.kubectl().args(["get", "pods", "-l", selector.as_str(), "-n", namespace, "-o", "name"]))?;

        let mut logs = String::new();
        for pod in pods.stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
            match self.runner.run_checked(&self.kubectl().args(["logs", pod, "-n", namespace, "--all-containers"])) {
                Ok(out) => {
                    logs.push_str(&format!("==> {pod} <==\n"));
                    logs.push_str(&out.stdout);
                    if !out.stdout.ends_with('\n') {
                        logs.push('\n');
                    }
                }
                Err(e) => warn!(namespace, pod, error = %e, "failed to fetch pod logs"),
            }
        }
        Ok(logs)
    }
}
