use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;

/// Class index to human-readable label mapping owned by a loaded model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelTable {
    names: BTreeMap<usize, String>,
}

impl LabelTable {
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names
                .into_iter()
                .enumerate()
                .map(|(i, name)| (i, name.into()))
                .collect(),
        }
    }

    /// Parse the `names` entry Ultralytics writes into ONNX metadata.
    ///
    /// The value is a Python dict literal such as `{0: 'person', 1: 'bicycle'}`,
    /// which reads as a YAML flow mapping. Quoted keys (`{"0": "helmet"}`) are
    /// accepted as well.
    pub fn parse_metadata(raw: &str) -> anyhow::Result<Self> {
        let mapping: Mapping = serde_yaml::from_str(raw)
            .map_err(|e| anyhow::anyhow!("class names metadata is not a mapping: {e}"))?;

        let names = mapping
            .into_iter()
            .map(|(key, value)| Ok::<_, anyhow::Error>((class_index(&key)?, class_name(value)?)))
            .collect::<anyhow::Result<BTreeMap<_, _>>>()?;

        Ok(Self { names })
    }

    pub fn name(&self, class_id: usize) -> String {
        self.names
            .get(&class_id)
            .cloned()
            .unwrap_or_else(|| format!("class_{class_id}"))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

fn class_index(key: &Value) -> anyhow::Result<usize> {
    let index = match key {
        Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    index.ok_or_else(|| anyhow::anyhow!("invalid class index {key:?}"))
}

fn class_name(value: Value) -> anyhow::Result<String> {
    match value {
        Value::String(name) => Ok(name),
        Value::Number(n) => Ok(n.to_string()),
        other => anyhow::bail!("invalid class name {other:?}"),
    }
}
