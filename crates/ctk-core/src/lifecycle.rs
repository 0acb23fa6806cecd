use crate::{Error, Result, TektonRun, WaitOutcome};

/// Created -> Submitted -> Watching -> terminal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunState {
    Created,
    Submitted(TektonRun),
    Watching(TektonRun),
    Finished(TektonRun, WaitOutcome),
}

impl RunState {
    pub fn name(&self) -> &'static str {
        match self {
            RunState::Created => "created",
            RunState::Submitted(_) => "submitted",
            RunState::Watching(_) => "watching",
            RunState::Finished(_, WaitOutcome::Succeeded) => "succeeded",
            RunState::Finished(_, WaitOutcome::Failed { .. }) => "failed",
            RunState::Finished(_, WaitOutcome::TimedOut { .. }) => "timed_out",
        }
    }
}

#[derive(Clone, Debug)]
pub struct RunLifecycle {
    state: RunState,
}

impl Default for RunLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl RunLifecycle {
    pub fn new() -> Self {
        Self { state: RunState::Created }
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn run(&self) -> Option<&TektonRun> {
        match &self.state {
            RunState::Created => None,
            RunState::Submitted(r) | RunState::Watching(r) | RunState::Finished(r, _) => Some(r),
        }
    }

    pub fn submitted(&mut self, run: TektonRun) -> Result<()> {
        match self.state {
            RunState::Created => {
                self.state = RunState::Submitted(run);
                Ok(())
            }
            _ => Err(self.illegal("submitted")),
        }
    }

    pub fn watching(&mut self) -> Result<()> {
        match &self.state {
            RunState::Submitted(run) => {
                self.state = RunState::Watching(run.clone());
                Ok(())
            }
            _ => Err(self.illegal("watching")),
        }
    }

    pub fn finish(&mut self, outcome: WaitOutcome) -> Result<()> {
        match &self.state {
            RunState::Watching(run) => {
                self.state = RunState::Finished(run.clone(), outcome);
                Ok(())
            }
            _ => Err(self.illegal("finished")),
        }
    }

    pub fn outcome(&self) -> Option<&WaitOutcome> {
        match &self.state {
            RunState::Finished(_, outcome) => Some(outcome),
            _ => None,
        }
    }

    fn illegal(&self, to: &str) -> Error {
        Error::Unsupported(format!("illegal run transition {} -> {}", self.state.name(), to))
    }
}
