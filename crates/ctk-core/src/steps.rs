use serde::Deserialize;
use serde_json::Value;

use crate::{Error, Result};

#[derive(Clone, Debug, Default, Deserialize)]
pub struct StepState {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub results: Vec<StepResult>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct StepResult {
    pub name: String,
    // Tekton defaults untyped results to string.
    #[serde(rename = "type", default = "default_result_type")]
    pub type_: String,
    #[serde(default)]
    pub value: Value,
}

fn default_result_type() -> String {
    "string".to_string()
}

impl StepResult {
    /// Emptiness under the result's declared type.
    pub fn is_empty(&self) -> Result<bool> {
        match self.type_.as_str() {
            "string" => Ok(self.value.as_str().map_or(true, str::is_empty)),
            "array" => Ok(self.value.as_array().map_or(true, Vec::is_empty)),
            "object" => Ok(self.value.as_object().map_or(true, |m| m.is_empty())),
            other => Err(Error::Unsupported(format!("unsupported result type for '{}': {}", self.name, other))),
        }
    }
}

/// Reads `status.steps` out of a TaskRun document.
pub fn step_states_from_run(run: &Value) -> Result<Vec<StepState>> {
    match run.pointer("/status/steps") {
        Some(steps) => Ok(serde_json::from_value(steps.clone())?),
        None => Ok(Vec::new()),
    }
}

/// Passes when `result_name` is present and non-empty. With `step_name`, only that step is searched.
pub fn check_step_result(steps: &[StepState], step_name: Option<&str>, result_name: &str) -> Result<()> {
    for step in steps.iter().filter(|s| step_name.map_or(true, |n| s.name == n)) {
        if let Some(result) = step.results.iter().find(|r| r.name == result_name) {
            if result.is_empty()? {
                return Err(Error::Assertion(format!(
                    "step result '{}' in step '{}' is empty",
                    result_name, step.name
                )));
            }
            return Ok(());
        }
    }
    let place = match step_name {
        Some(n) => format!("step '{n}'"),
        None => "any step".to_string(),
    };
    Err(Error::Assertion(format!("step result '{result_name}' not found in {place}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn steps(v: Value) -> Vec<StepState> {
        step_states_from_run(&json!({ "status": { "steps": v } })).unwrap()
    }

    #[test]
    fn empty_string_result_fails() {
        let s = steps(json!([{ "name": "build", "results": [{ "name": "digest", "type": "string", "value": "" }] }]));
        let err = check_step_result(&s, Some("build"), "digest").unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn non_empty_string_result_passes() {
        let s = steps(json!([{ "name": "build", "results": [{ "name": "digest", "type": "string", "value": "sha256:abc" }] }]));
        check_step_result(&s, Some("build"), "digest").unwrap();
        check_step_result(&s, None, "digest").unwrap();
    }

    #[test]
    fn array_and_object_emptiness() {
        let s = steps(json!([{ "name": "s", "results": [
            { "name": "list", "type": "array", "value": ["a"] },
            { "name": "none", "type": "array", "value": [] },
            { "name": "obj", "type": "object", "value": { "k": "v" } },
            { "name": "nobj", "type": "object" }
        ] }]));
        check_step_result(&s, None, "list").unwrap();
        check_step_result(&s, None, "obj").unwrap();
        assert!(check_step_result(&s, None, "none").is_err());
        assert!(check_step_result(&s, None, "nobj").is_err());
    }

    #[test]
    fn unknown_type_is_unsupported() {
        let s = steps(json!([{ "name": "s", "results": [{ "name": "r", "type": "blob", "value": "x" }] }]));
        assert!(matches!(check_step_result(&s, None, "r"), Err(Error::Unsupported(_))));
    }

    #[test]
    fn result_in_other_step_is_not_found() {
        let s = steps(json!([{ "name": "fetch", "results": [{ "name": "digest", "value": "sha256:1" }] }]));
        let err = check_step_result(&s, Some("build"), "digest").unwrap_err();
        assert!(err.to_string().contains("not found in step 'build'"));
    }
}
