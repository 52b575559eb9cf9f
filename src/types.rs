use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::constants::NULL_MARKERS;

/// A single cell as it arrives from a raw listings file or JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Null,
    Number(f64),
    Text(String),
}

impl RawValue {
    /// Interpret a CSV field, mapping the usual null markers to `Null`.
    pub fn from_field(field: &str) -> Self {
        if NULL_MARKERS.contains(&field) {
            RawValue::Null
        } else {
            RawValue::Text(field.to_string())
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RawValue::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            RawValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Category label of a cell. Blank text counts as missing.
    pub fn to_category(&self) -> Option<String> {
        match self {
            RawValue::Null => None,
            RawValue::Number(n) => Some(n.to_string()),
            RawValue::Text(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
        }
    }
}

impl From<&serde_json::Value> for RawValue {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => RawValue::Null,
            serde_json::Value::Number(n) => n.as_f64().map(RawValue::Number).unwrap_or(RawValue::Null),
            serde_json::Value::String(s) => RawValue::Text(s.clone()),
            serde_json::Value::Bool(b) => RawValue::Text(b.to_string()),
            other => RawValue::Text(other.to_string()),
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<Option<&str>> for RawValue {
    fn from(value: Option<&str>) -> Self {
        value.map(RawValue::from).unwrap_or(RawValue::Null)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

/// One raw listing: column name to raw cell.
pub type RawRecord = HashMap<String, RawValue>;

/// An ordered batch of raw listings with the header it was read with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawBatch {
    pub columns: Vec<String>,
    pub rows: Vec<RawRecord>,
}

impl RawBatch {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a batch from column-major data. Shorter columns are padded with nulls.
    pub fn from_columns(data: Vec<(&str, Vec<RawValue>)>) -> Self {
        let len = data.iter().map(|(_, v)| v.len()).max().unwrap_or(0);
        let columns: Vec<String> = data.iter().map(|(c, _)| c.to_string()).collect();
        let mut rows = vec![RawRecord::new(); len];
        for (name, values) in data {
            for (i, row) in rows.iter_mut().enumerate() {
                let value = values.get(i).cloned().unwrap_or(RawValue::Null);
                row.insert(name.to_string(), value);
            }
        }
        Self { columns, rows }
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell lookup that treats an absent key as null.
    pub fn value<'a>(row: &'a RawRecord, column: &str) -> &'a RawValue {
        static NULL: RawValue = RawValue::Null;
        row.get(column).unwrap_or(&NULL)
    }
}
