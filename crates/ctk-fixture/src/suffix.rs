//! Per-invocation renaming so concurrent runs against one cluster never collide.
//!
//! A StepAction `foo` becomes `foo-<suffix>`, and every reference to it inside the
//! test manifests follows, so the renamed files stay internally consistent.

use std::collections::BTreeSet;

use serde_yaml::Value;

use crate::manifest::{doc_kind, doc_name, set_doc_name, visit_keyed_mappings, Manifest};

const SUFFIX_LEN: usize = 5;
const SUFFIX_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Five characters from `[a-z0-9]`.
pub fn random_suffix() -> String {
    (0..SUFFIX_LEN).map(|_| SUFFIX_CHARSET[fastrand::usize(..SUFFIX_CHARSET.len())] as char).collect()
}

pub fn suffixed(name: &str, suffix: &str) -> String {
    format!("{name}-{suffix}")
}

/// Renames every document of a StepAction file. Returns the original name of the first one.
pub fn suffix_step_action(manifest: &mut Manifest, suffix: &str) -> Option<String> {
    let original = manifest.docs.iter().find_map(doc_name).map(str::to_string);
    for doc in &mut manifest.docs {
        if let Some(name) = doc_name(doc).map(str::to_string) {
            set_doc_name(doc, &suffixed(&name, suffix));
        }
    }
    original
}

/// Renames a test manifest and its references.
///
/// `ref`, `taskRef` and `pipelineRef` names pointing at the StepAction, and `taskRef`/
/// `pipelineRef` names pointing at Tasks or Pipelines declared in the same file, get the
/// suffix. References to anything else (cluster tasks, catalog tasks) are left alone.
pub fn suffix_test_manifest(manifest: &mut Manifest, step_action: &str, suffix: &str) {
    let local: BTreeSet<String> = manifest
        .docs
        .iter()
        .filter(|d| matches!(doc_kind(d), Some("Task" | "Pipeline")))
        .filter_map(doc_name)
        .map(str::to_string)
        .collect();

    for doc in &mut manifest.docs {
        visit_keyed_mappings(doc, &mut |key, inner| {
            let Some(Value::String(name)) = inner.get_mut("name") else { return };
            let rename = match key {
                "ref" => name.as_str() == step_action,
                "taskRef" | "pipelineRef" => name.as_str() == step_action || local.contains(name.as_str()),
                _ => false,
            };
            if rename {
                *name = suffixed(name, suffix);
            }
        });
        if let Some(name) = doc_name(doc).map(str::to_string) {
            set_doc_name(doc, &suffixed(&name, suffix));
        }
    }
}
