use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, ScopeId};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RunKind {
    TaskRun,
    PipelineRun,
}

impl RunKind {
    /// Plural resource name as kubectl expects it (`taskruns`).
    pub fn resource(&self) -> &'static str {
        match self {
            RunKind::TaskRun => "taskruns",
            RunKind::PipelineRun => "pipelineruns",
        }
    }

    /// Label Tekton puts on pods it creates for a run of this kind.
    pub fn pod_label(&self) -> &'static str {
        match self {
            RunKind::TaskRun => "tekton.dev/taskRun",
            RunKind::PipelineRun => "tekton.dev/pipelineRun",
        }
    }
}

impl FromStr for RunKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "taskrun" => Ok(RunKind::TaskRun),
            "pipelinerun" => Ok(RunKind::PipelineRun),
            other => Err(Error::Unsupported(format!("unsupported Tekton run kind: {other}"))),
        }
    }
}

impl fmt::Display for RunKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunKind::TaskRun => f.write_str("TaskRun"),
            RunKind::PipelineRun => f.write_str("PipelineRun"),
        }
    }
}

/// One submitted Tekton execution.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TektonRun {
    pub name: String,
    pub kind: RunKind,
}

impl TektonRun {
    pub fn new(name: impl Into<String>, kind: RunKind) -> Self {
        Self { name: name.into(), kind }
    }

    /// `taskruns/<name>` form used by kubectl.
    pub fn resource_ref(&self) -> String {
        format!("{}/{}", self.kind.resource(), self.name)
    }
}

impl fmt::Display for TektonRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Direct,
    Managed,
}

impl FromStr for ExecutionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" | "v1" => Ok(ExecutionMode::Direct),
            "managed" | "v2" => Ok(ExecutionMode::Managed),
            other => Err(Error::Unsupported(format!("unknown execution mode: {other}"))),
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Direct => f.write_str("direct"),
            ExecutionMode::Managed => f.write_str("managed"),
        }
    }
}

/// Isolated environment for one test.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Scope {
    pub id: ScopeId,
    pub mode: ExecutionMode,
}

impl Scope {
    pub fn new(mode: ExecutionMode) -> Self {
        Self { id: ScopeId::new(), mode }
    }

    /// Namespace that holds every object of a direct-mode test.
    pub fn namespace(&self) -> &str {
        self.id.as_str()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WaitOutcome {
    Succeeded,
    Failed { reason: String },
    TimedOut { after: Duration },
}

impl WaitOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, WaitOutcome::Succeeded)
    }
}

impl fmt::Display for WaitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitOutcome::Succeeded => f.write_str("succeeded"),
            WaitOutcome::Failed { reason } => write!(f, "failed: {reason}"),
            WaitOutcome::TimedOut { after } => write!(f, "timed out after {after:?}"),
        }
    }
}

/// Terminal outcome plus whatever diagnostics could be gathered for it.
#[derive(Clone, Debug)]
pub struct Completion {
    pub outcome: WaitOutcome,
    pub logs: Option<String>,
}
