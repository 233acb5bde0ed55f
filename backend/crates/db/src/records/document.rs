use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One property value as stored in a row's document column.
///
/// Upstream delivers strings or null; numbers and booleans only appear in
/// documents written by older tooling, and are kept as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

impl DocValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<&str> for DocValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<serde_json::Value> for DocValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::Text(s),
            // Nested structures are not expected in a flat property map; keep
            // them losslessly as their JSON text instead of failing the read.
            nested @ (Value::Array(_) | Value::Object(_)) => Self::Text(nested.to_string()),
        }
    }
}

/// Union of every property ever observed for one identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(BTreeMap<String, DocValue>);

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a stored jsonb value. Anything but an object yields an empty document.
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Object(map) => map
                .into_iter()
                .map(|(k, v)| (k, DocValue::from(v)))
                .collect(),
            _ => Self::default(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&DocValue> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<DocValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Shallow union: keys from `newer` overwrite, keys only in `self` survive.
    pub fn merged_with(&self, newer: &Document) -> Document {
        let mut merged = self.clone();
        merged.merge_from(newer);
        merged
    }

    pub fn merge_from(&mut self, newer: &Document) {
        for (key, value) in &newer.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.0
                .iter()
                .map(|(k, v)| {
                    let value = match v {
                        DocValue::Null => serde_json::Value::Null,
                        DocValue::Bool(b) => serde_json::Value::Bool(*b),
                        DocValue::Number(n) => serde_json::Value::Number(n.clone()),
                        DocValue::Text(s) => serde_json::Value::String(s.clone()),
                    };
                    (k.clone(), value)
                })
                .collect(),
        )
    }
}

impl FromIterator<(String, DocValue)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, DocValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
