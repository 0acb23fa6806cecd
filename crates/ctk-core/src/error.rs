use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("command `{command}` failed\n{output}")]
    CommandFailed { command: String, output: String },

    #[error("command `{command}` timed out after {after:?}\n{output}")]
    CommandTimedOut { command: String, after: Duration, output: String },

    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("assertion failed: {0}")]
    Assertion(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Captured process output, when the error came from a subprocess.
    pub fn output(&self) -> Option<&str> {
        match self {
            Error::CommandFailed { output, .. } | Error::CommandTimedOut { output, .. } => Some(output),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
