use std::collections::BTreeMap;

use serde::Serialize;

/// A single telemetry field value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
}

impl FieldValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            FieldValue::Float(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(v) => Some(*v as f64),
            FieldValue::Float(v) => Some(*v),
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Int(v) => write!(f, "{v}i"),
            FieldValue::Float(v) => write!(f, "{v}"),
        }
    }
}

/// A named set of fields recorded for one round.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsPoint {
    pub name: String,
    pub round_index: u64,
    pub fields: BTreeMap<String, FieldValue>,
}

impl StatsPoint {
    pub fn new(name: impl Into<String>, round_index: u64) -> Self {
        Self {
            name: name.into(),
            round_index,
            fields: BTreeMap::new(),
        }
    }

    pub fn int_field(&mut self, name: impl Into<String>, value: i64) -> &mut Self {
        self.fields.insert(name.into(), FieldValue::Int(value));
        self
    }

    /// Record a count. Counts never come close to `i64::MAX`.
    pub fn count_field(&mut self, name: impl Into<String>, value: usize) -> &mut Self {
        self.int_field(name, i64::try_from(value).unwrap_or(i64::MAX))
    }

    pub fn float_field(&mut self, name: impl Into<String>, value: f64) -> &mut Self {
        self.fields.insert(name.into(), FieldValue::Float(value));
        self
    }

    pub fn get(&self, name: &str) -> Option<FieldValue> {
        self.fields.get(name).copied()
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(|v| v.as_i64())
    }

    pub fn float(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(|v| v.as_f64())
    }

    /// Line-protocol style rendering, used in logs.
    pub fn to_line(&self) -> String {
        let fields: Vec<String> = self
            .fields
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        format!("{},round_index={} {}", self.name, self.round_index, fields.join(","))
    }
}
