//! Per-test expectations, read from `tests/<name>.expect.toml` next to the manifest.
//!
//! ```toml
//! outcome = "succeeded"
//!
//! [[assert]]
//! field = ".status.results[0].value"
//! equals = "main"
//!
//! [[assert]]
//! step = "clone"
//! result = "commit"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpectedOutcome {
    #[default]
    Succeeded,
    Failed,
}

/// One `[[assert]]` entry. Keys from both kinds in one entry are rejected.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Check {
    StepResult(StepResultCheck),
    Field(FieldCheck),
}

/// A step result that must be present and non-empty.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepResultCheck {
    #[serde(default)]
    pub step: Option<String>,
    pub result: String,
}

/// A run field that must be non-empty, or equal `equals` when given.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldCheck {
    pub field: String,
    #[serde(default)]
    pub equals: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expectations {
    #[serde(default)]
    pub outcome: ExpectedOutcome,
    #[serde(default, rename = "assert")]
    pub checks: Vec<Check>,
}

impl Expectations {
    pub fn path_for(manifest: &Path) -> PathBuf {
        let stem = manifest.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        manifest.with_file_name(format!("{stem}.expect.toml"))
    }

    /// Expectations for a test manifest; a run that must succeed when there is no file.
    pub fn load_for(manifest: &Path) -> Result<Self> {
        let path = Self::path_for(manifest);
        if !path.exists() {
            return Ok(Self::default());
        }
        let s = std::fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        toml::from_str(&s).with_context(|| format!("parse {}", path.display()))
    }
}
