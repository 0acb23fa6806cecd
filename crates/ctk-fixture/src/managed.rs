use ctk_core::{Error, Result, RunKind, ScopeId, TektonRun};
use serde_yaml::{Mapping, Value};

use crate::manifest::{doc_kind, mapping_entry, set_doc_name, visit_keyed_mappings, Manifest};

/// Settings the managed build API needs on every submitted run.
#[derive(Clone, Debug)]
pub struct ManagedDocument<'a> {
    pub name_prefix: &'a str,
    pub service_account: &'a str,
    /// StepAction name and the OCI reference it was pushed to.
    pub bundle: Option<(&'a str, &'a str)>,
}

impl ManagedDocument<'_> {
    /// Builds the single run document submitted to the managed API.
    ///
    /// The run is renamed to `<prefix><scope id>`, gets a service account when it has
    /// none, keeps only the first workspace's name, and resolves the StepAction from
    /// its pushed bundle.
    pub fn prepare(&self, manifest: &Manifest, scope: &ScopeId) -> Result<(Manifest, TektonRun)> {
        let runs: Vec<&Value> = manifest
            .docs
            .iter()
            .filter(|d| matches!(doc_kind(d), Some("TaskRun" | "PipelineRun")))
            .collect();
        let [run] = runs.as_slice() else {
            return Err(Error::Unsupported(format!(
                "managed mode submits exactly one TaskRun or PipelineRun, found {}",
                runs.len()
            )));
        };
        if manifest.docs.len() > 1 {
            return Err(Error::Unsupported(
                "managed mode cannot submit companion documents; embed them with taskSpec/pipelineSpec".into(),
            ));
        }

        let kind: RunKind = doc_kind(run).unwrap_or_default().parse()?;
        let name = format!("{}{}", self.name_prefix, scope);
        let mut doc = (*run).clone();

        set_doc_name(&mut doc, &name);
        let spec = mapping_entry(&mut doc, "spec");
        inject_service_account(spec, self.service_account);
        truncate_workspaces(spec);
        if let Some((step_action, oci_ref)) = self.bundle {
            resolve_from_bundle(&mut doc, step_action, oci_ref);
        }

        Ok((Manifest { docs: vec![doc] }, TektonRun::new(name, kind)))
    }
}

fn inject_service_account(spec: &mut Mapping, service_account: &str) {
    let security = spec.entry(Value::from("security")).or_insert_with(|| Value::Mapping(Mapping::new()));
    if !security.is_mapping() {
        *security = Value::Mapping(Mapping::new());
    }
    if let Value::Mapping(security) = security {
        let key = Value::from("serviceAccount");
        if !security.contains_key(&key) {
            security.insert(key, Value::from(service_account));
        }
    }
}

fn truncate_workspaces(spec: &mut Mapping) {
    let Some(Value::Sequence(workspaces)) = spec.get_mut("workspaces") else { return };
    let first = workspaces.first().and_then(|w| w.get("name")).cloned();
    workspaces.clear();
    if let Some(name) = first {
        let mut kept = Mapping::new();
        kept.insert(Value::from("name"), name);
        workspaces.push(Value::Mapping(kept));
    }
}

fn resolve_from_bundle(doc: &mut Value, step_action: &str, oci_ref: &str) {
    visit_keyed_mappings(doc, &mut |key, inner| {
        if key != "ref" || inner.get("name").and_then(Value::as_str) != Some(step_action) {
            return;
        }
        *inner = bundle_ref(step_action, oci_ref);
    });
}

fn bundle_ref(step_action: &str, oci_ref: &str) -> Mapping {
    let param = |name: &str, value: &str| {
        let mut m = Mapping::new();
        m.insert(Value::from("name"), Value::from(name));
        m.insert(Value::from("value"), Value::from(value));
        Value::Mapping(m)
    };
    let mut m = Mapping::new();
    m.insert(Value::from("resolver"), Value::from("bundles"));
    m.insert(
        Value::from("params"),
        Value::Sequence(vec![param("bundle", oci_ref), param("name", step_action), param("kind", "stepaction")]),
    );
    m
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::doc_name;

    const RUN: &str = r#"
apiVersion: tekton.dev/v1
kind: TaskRun
metadata:
  name: git-clone-test
spec:
  workspaces:
    - name: output
      emptyDir: {}
    - name: ssh
      secret:
        secretName: ssh
  taskSpec:
    steps:
      - name: clone
        ref:
          name: git-clone
"#;

    fn settings<'a>() -> ManagedDocument<'a> {
        ManagedDocument {
            name_prefix: "ctk-",
            service_account: "builder@example.iam.gserviceaccount.com",
            bundle: Some(("git-clone", "us-docker.pkg.dev/p/r/git-clone:abc")),
        }
    }

    #[test]
    fn prepares_run_for_submission() {
        let scope = ScopeId::from_str("abc");
        let (m, run) = settings().prepare(&Manifest::parse(RUN).unwrap(), &scope).unwrap();
        let doc = &m.docs[0];

        assert_eq!(run, TektonRun::new("ctk-abc", RunKind::TaskRun));
        assert_eq!(doc_name(doc), Some("ctk-abc"));
        assert_eq!(
            doc["spec"]["security"]["serviceAccount"].as_str(),
            Some("builder@example.iam.gserviceaccount.com")
        );

        let workspaces = doc["spec"]["workspaces"].as_sequence().unwrap();
        assert_eq!(workspaces.len(), 1);
        assert_eq!(workspaces[0].as_mapping().unwrap().len(), 1);
        assert_eq!(workspaces[0]["name"].as_str(), Some("output"));

        let r = &doc["spec"]["taskSpec"]["steps"][0]["ref"];
        assert_eq!(r["resolver"].as_str(), Some("bundles"));
        assert_eq!(r["params"][0]["value"].as_str(), Some("us-docker.pkg.dev/p/r/git-clone:abc"));
        assert_eq!(r["params"][2]["value"].as_str(), Some("stepaction"));
    }

    #[test]
    fn keeps_existing_service_account() {
        let text = "kind: PipelineRun\nmetadata:\n  name: p\nspec:\n  security:\n    serviceAccount: mine\n";
        let (m, run) = settings().prepare(&Manifest::parse(text).unwrap(), &ScopeId::from_str("x")).unwrap();
        assert_eq!(run.kind, RunKind::PipelineRun);
        assert_eq!(m.docs[0]["spec"]["security"]["serviceAccount"].as_str(), Some("mine"));
        assert!(m.docs[0]["spec"].get("workspaces").is_none());
    }

    #[test]
    fn rejects_companion_documents() {
        let text = "kind: Task\nmetadata:\n  name: t\n---\nkind: TaskRun\nmetadata:\n  name: r\n";
        let err = settings().prepare(&Manifest::parse(text).unwrap(), &ScopeId::from_str("x")).unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
    }
}
