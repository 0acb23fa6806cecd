use serde::{Deserialize, Serialize};

use crate::WaitOutcome;

/// Condition type Tekton uses to report that a run reached a terminal state.
pub const SUCCEEDED: &str = "Succeeded";

/// Status literal of a true condition on the Kubernetes API.
pub const DIRECT_TRUE: &str = "True";
/// Status literal the managed build API uses for a true condition.
pub const MANAGED_TRUE: &str = "TRUE";
/// Status literal the managed build API uses for a false condition.
pub const MANAGED_FALSE: &str = "FALSE";

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl Condition {
    fn describe(&self) -> String {
        match (&self.reason, &self.message) {
            (Some(r), Some(m)) if !m.is_empty() => format!("{r}: {m}"),
            (Some(r), _) => r.clone(),
            (None, Some(m)) => m.clone(),
            (None, None) => format!("{} is {}", self.type_, self.status),
        }
    }
}

/// Linear search by type name. Position in the list carries no meaning.
pub fn find_condition<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}

/// A run is done once its `Succeeded` condition has left `Unknown`.
pub fn run_is_done(conditions: &[Condition]) -> bool {
    find_condition(conditions, SUCCEEDED).is_some_and(|c| c.status != "Unknown" && !c.status.is_empty())
}

pub fn condition_met(conditions: &[Condition], expected: &str) -> bool {
    conditions.iter().any(|c| c.type_ == expected && c.status == DIRECT_TRUE)
}

/// Status block of a TaskRun or PipelineRun as it appears in watch events.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RunStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

#[derive(Clone, Debug)]
pub enum WatchEvent {
    Added(RunStatus),
    Modified(RunStatus),
    Deleted,
    Error(String),
}

/// Direct-path verdict for one watch event. `None` means keep watching.
pub fn observe_direct(event: &WatchEvent, expected: &str) -> Option<WaitOutcome> {
    match event {
        WatchEvent::Added(status) | WatchEvent::Modified(status) => {
            if !run_is_done(&status.conditions) {
                return None;
            }
            if condition_met(&status.conditions, expected) {
                return Some(WaitOutcome::Succeeded);
            }
            let reason = find_condition(&status.conditions, SUCCEEDED)
                .map(Condition::describe)
                .unwrap_or_else(|| format!("run finished without condition {expected}"));
            Some(WaitOutcome::Failed { reason })
        }
        WatchEvent::Deleted => Some(WaitOutcome::Failed { reason: "run was deleted before completing".into() }),
        WatchEvent::Error(msg) => Some(WaitOutcome::Failed { reason: format!("watch error: {msg}") }),
    }
}

/// Managed-path verdict for one describe result. `None` means still queued or working.
pub fn observe_managed(conditions: &[Condition]) -> Option<WaitOutcome> {
    let cond = find_condition(conditions, SUCCEEDED)?;
    match cond.status.as_str() {
        MANAGED_TRUE => Some(WaitOutcome::Succeeded),
        MANAGED_FALSE => Some(WaitOutcome::Failed { reason: cond.describe() }),
        _ => None,
    }
}
