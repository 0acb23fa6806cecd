use ctk_core::{
    observe_direct, parse_created_run, Condition, ExecutionMode, RunKind, RunLifecycle, RunStatus, Scope, WaitOutcome,
    WatchEvent,
};

#[test]
fn test_scope_creation() {
    let a = Scope::new(ExecutionMode::Direct);
    let b = Scope::new(ExecutionMode::Direct);
    assert_ne!(a.id, b.id);
    assert_eq!(a.namespace(), a.id.as_str());
}

#[test]
fn test_apply_output_drives_lifecycle() {
    let out = "stepaction.tekton.dev/echo-q1w2e created\ntaskrun.tekton.dev/echo-run-q1w2e created\n";
    let run = parse_created_run(out).unwrap();
    assert_eq!(run.kind, RunKind::TaskRun);

    let mut lc = RunLifecycle::new();
    lc.submitted(run).unwrap();
    lc.watching().unwrap();

    let pending = WatchEvent::Added(RunStatus {
        conditions: vec![Condition { type_: "Succeeded".into(), status: "Unknown".into(), reason: None, message: None }],
    });
    assert_eq!(observe_direct(&pending, "Succeeded"), None);

    let done = WatchEvent::Modified(RunStatus {
        conditions: vec![Condition {
            type_: "Succeeded".into(),
            status: "True".into(),
            reason: Some("Succeeded".into()),
            message: None,
        }],
    });
    let outcome = observe_direct(&done, "Succeeded").unwrap();
    lc.finish(outcome).unwrap();
    assert_eq!(lc.outcome(), Some(&WaitOutcome::Succeeded));
}
