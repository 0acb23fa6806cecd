use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ctk_core::{Error, ExecutionMode, RunKind, Scope, TektonRun, WaitOutcome};
use ctk_direct::{DirectStrategy, PullSecret, WaitMethod};
use ctk_exec::{Reply, ScriptedRunner};
use ctk_fixture::{stage_fixture, StagedFixture};
use ctk_strategy::contract::run_strategy_contract;
use ctk_strategy::{RunStrategy, WaitSpec};

const DONE: &str = r#"{"type":"ADDED","object":{"status":{"conditions":[{"type":"Succeeded","status":"True","reason":"Succeeded"}]}}}"#;

fn staged(src: &Path, work: &Path) -> StagedFixture {
    fs::create_dir_all(src.join("tests")).unwrap();
    fs::write(src.join("git-clone.yaml"), "kind: StepAction\nmetadata:\n  name: git-clone\n").unwrap();
    fs::write(
        src.join("tests/run.yaml"),
        "kind: TaskRun\nmetadata:\n  name: clone-run\nspec:\n  taskSpec:\n    steps:\n      - name: clone\n        ref:\n          name: git-clone\n",
    )
    .unwrap();
    stage_fixture(src, work, "abcde").unwrap()
}

fn cluster() -> ScriptedRunner {
    ScriptedRunner::new()
        .on("kubectl", &["create", "namespace"], Reply::ok("namespace/x created\n"))
        .on("kubectl", &["apply", "git-clone.yaml"], Reply::ok("stepaction.tekton.dev/git-clone-abcde created\n"))
        .on("kubectl", &["apply", "run.yaml"], Reply::ok("taskrun.tekton.dev/clone-run-abcde created\n"))
        .on("kubectl", &["--watch"], Reply::ok(DONE))
        .on("kubectl", &["get", "taskruns/", "yaml"], Reply::ok("kind: TaskRun\nstatus: {}\n"))
        .on("kubectl", &["delete", "namespace"], Reply::ok("namespace \"x\" deleted\n"))
}

#[test]
fn direct_strategy_passes_contract() {
    let src = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let fixture = staged(src.path(), work.path());
    let runner = Arc::new(cluster());
    let strategy = DirectStrategy::new(runner.clone()).with_kubeconfig(Some("/tmp/kc".into()));

    let scope = run_strategy_contract(&strategy, &fixture).unwrap();
    let ns = scope.namespace().to_string();

    let lines = runner.command_lines();
    assert_eq!(lines[0], format!("kubectl --kubeconfig=/tmp/kc create namespace {ns}"));
    assert!(lines.iter().any(|l| l.contains(&format!(
        "get taskruns --field-selector=metadata.name=clone-run-abcde -n {ns} --watch --output-watch-events -o json"
    ))));
    assert_eq!(lines.last().unwrap(), &format!("kubectl --kubeconfig=/tmp/kc delete namespace {ns} --ignore-not-found"));
}

#[test]
fn watch_honours_deadline() {
    let runner = Arc::new(ScriptedRunner::new().on("kubectl", &["--watch"], Reply::Hang(Duration::from_secs(3))));
    let strategy = DirectStrategy::new(runner);
    let scope = Scope::new(ExecutionMode::Direct);
    let run = TektonRun::new("slow", RunKind::TaskRun);

    let started = Instant::now();
    let wait = WaitSpec { timeout: Duration::from_millis(300), ..Default::default() };
    let outcome = strategy.wait(&scope, &run, &wait).unwrap();
    assert_eq!(outcome, WaitOutcome::TimedOut { after: Duration::from_millis(300) });
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[test]
fn failed_pull_secret_removes_namespace() {
    let runner = Arc::new(
        ScriptedRunner::new()
            .on("kubectl", &["create", "namespace"], Reply::ok(""))
            .on("kubectl", &["create", "secret"], Reply::fail("error: open /nope: no such file or directory"))
            .on("kubectl", &["delete", "namespace"], Reply::ok("")),
    );
    let strategy = DirectStrategy::new(runner.clone())
        .with_pull_secret(Some(PullSecret { name: "regcred".into(), docker_config: "/nope".into() }));

    let err = strategy.open_scope(&Scope::new(ExecutionMode::Direct)).unwrap_err();
    assert!(err.output().unwrap().contains("no such file"));
    assert!(runner.command_lines().last().unwrap().contains("delete namespace"));
}

#[test]
fn pull_secret_never_appears_inline() {
    let runner = Arc::new(
        ScriptedRunner::new()
            .on("kubectl", &["create"], Reply::ok(""))
            .on("kubectl", &["patch", "serviceaccount"], Reply::ok("")),
    );
    let strategy = DirectStrategy::new(runner.clone())
        .with_pull_secret(Some(PullSecret { name: "regcred".into(), docker_config: "/home/ci/.docker/config.json".into() }));
    let finalizers = strategy.open_scope(&Scope::new(ExecutionMode::Direct)).unwrap();
    assert_eq!(finalizers.len(), 1);

    let lines = runner.command_lines();
    assert!(lines[1].contains("--from-file=.dockerconfigjson=/home/ci/.docker/config.json"));
    assert!(lines[2].contains(r#"{"imagePullSecrets":[{"name":"regcred"}]}"#));
}

#[test]
fn submit_without_created_run_is_a_parse_error() {
    let runner = Arc::new(ScriptedRunner::new().on("kubectl", &["apply"], Reply::ok("task.tekton.dev/check created\n")));
    let src = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let fixture = staged(src.path(), work.path());
    let err = DirectStrategy::new(runner)
        .submit(&Scope::new(ExecutionMode::Direct), &fixture, &fixture.tests[0])
        .unwrap_err();
    assert!(matches!(err, Error::Parse(_)));
}

#[test]
fn kubectl_wait_maps_exit_to_outcome() {
    let scope = Scope::new(ExecutionMode::Direct);
    let run = TektonRun::new("r", RunKind::PipelineRun);
    let wait = WaitSpec::default();

    let ok = DirectStrategy::new(Arc::new(ScriptedRunner::new().on("kubectl", &["wait"], Reply::ok("condition met"))))
        .with_wait_method(WaitMethod::KubectlWait);
    assert_eq!(ok.wait(&scope, &run, &wait).unwrap(), WaitOutcome::Succeeded);
    let slow = DirectStrategy::new(Arc::new(
        ScriptedRunner::new().on("kubectl", &["wait"], Reply::fail("error: timed out waiting for the condition")),
    ))
    .with_wait_method(WaitMethod::KubectlWait);
    assert!(matches!(slow.wait(&scope, &run, &wait).unwrap(), WaitOutcome::TimedOut { .. }));
}

#[test]
fn kubectl_wait_accepts_an_unbounded_timeout() {
    let runner = Arc::new(ScriptedRunner::new().on("kubectl", &["wait"], Reply::ok("condition met")));
    let strategy = DirectStrategy::new(runner.clone()).with_wait_method(WaitMethod::KubectlWait);
    let wait = WaitSpec { timeout: Duration::MAX, ..Default::default() };

    let outcome = strategy.wait(&Scope::new(ExecutionMode::Direct), &TektonRun::new("r", RunKind::TaskRun), &wait).unwrap();
    assert_eq!(outcome, WaitOutcome::Succeeded);
    assert_eq!(runner.calls()[0].timeout, Some(Duration::MAX));
}

#[test]
fn step_states_come_from_taskrun_status() {
    let json = r#"{"status":{"steps":[{"name":"clone","results":[{"name":"commit","value":"abc"}]}]}}"#;
    let runner = Arc::new(ScriptedRunner::new().on("kubectl", &["get", "json"], Reply::ok(json)));
    let strategy = DirectStrategy::new(runner);
    let scope = Scope::new(ExecutionMode::Direct);

    let steps = strategy.step_states(&scope, &TektonRun::new("r", RunKind::TaskRun)).unwrap();
    assert_eq!(steps[0].results[0].name, "commit");
    let err = strategy.step_states(&scope, &TektonRun::new("p", RunKind::PipelineRun)).unwrap_err();
    assert!(matches!(err, Error::Unsupported(_)));
}

#[test]
fn logs_are_gathered_per_pod() {
    let runner = Arc::new(
        ScriptedRunner::new()
            .on("kubectl", &["get", "pods", "tekton.dev/taskRun=r"], Reply::ok("pod/r-pod\npod/r-pod-2\n"))
            .on("kubectl", &["logs", "pod/r-pod-2"], Reply::fail("container not found"))
            .on("kubectl", &["logs", "pod/r-pod"], Reply::ok("cloning...")),
    );
    let logs = DirectStrategy::new(runner)
        .collect_logs(&Scope::new(ExecutionMode::Direct), &TektonRun::new("r", RunKind::TaskRun))
        .unwrap();
    assert_eq!(logs, "==> pod/r-pod <==\ncloning...\n");
}
