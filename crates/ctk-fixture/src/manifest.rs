use std::path::Path;

use ctk_core::{Error, Result};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};

/// A YAML file as a list of documents, in file order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Manifest {
    pub docs: Vec<Value>,
}

impl Manifest {
    pub fn parse(text: &str) -> Result<Self> {
        let mut docs = Vec::new();
        for de in serde_yaml::Deserializer::from_str(text) {
            let doc = Value::deserialize(de)?;
            if !doc.is_null() {
                docs.push(doc);
            }
        }
        Ok(Self { docs })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text).map_err(|e| Error::Parse(format!("{}: {}", path.display(), e)))
    }

    pub fn to_yaml(&self) -> Result<String> {
        let mut parts = Vec::with_capacity(self.docs.len());
        for doc in &self.docs {
            parts.push(serde_yaml::to_string(doc)?);
        }
        Ok(parts.join("---\n"))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_yaml()?)?;
        Ok(())
    }
}

pub fn doc_kind(doc: &Value) -> Option<&str> {
    doc.get("kind").and_then(Value::as_str)
}

pub fn doc_name(doc: &Value) -> Option<&str> {
    doc.get("metadata").and_then(|m| m.get("name")).and_then(Value::as_str)
}

pub fn set_doc_name(doc: &mut Value, name: &str) {
    mapping_entry(doc, "metadata").insert(Value::from("name"), Value::from(name));
}

/// Mapping under `key`, created when absent or not a mapping.
pub fn mapping_entry<'a>(doc: &'a mut Value, key: &str) -> &'a mut Mapping {
    if !doc.is_mapping() {
        *doc = Value::Mapping(Mapping::new());
    }
    let Value::Mapping(map) = doc else { unreachable!("just ensured a mapping") };
    let slot = map.entry(Value::from(key)).or_insert_with(|| Value::Mapping(Mapping::new()));
    if !slot.is_mapping() {
        *slot = Value::Mapping(Mapping::new());
    }
    match slot {
        Value::Mapping(m) => m,
        _ => unreachable!("just ensured a mapping"),
    }
}

/// Calls `visit` with every nested mapping stored under a key, depth first.
pub(crate) fn visit_keyed_mappings(value: &mut Value, visit: &mut dyn FnMut(&str, &mut Mapping)) {
    match value {
        Value::Mapping(map) => {
            for (k, v) in map.iter_mut() {
                if let (Some(key), Value::Mapping(inner)) = (k.as_str(), &mut *v) {
                    visit(key, inner);
                }
                visit_keyed_mappings(v, visit);
            }
        }
        Value::Sequence(seq) => {
            for v in seq {
                visit_keyed_mappings(v, visit);
            }
        }
        Value::Tagged(tagged) => visit_keyed_mappings(&mut tagged.value, visit),
        _ => {}
    }
}
