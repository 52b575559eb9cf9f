use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use crate::error::{PricerError, SchemaError};

/// Category code table: for each categorical column, its values in code order.
///
/// Codes are positions in the sorted list, so a vocabulary built from the same
/// set of values always assigns the same codes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vocabulary {
    columns: BTreeMap<String, Vec<String>>,
}

impl Vocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the distinct values of a column, replacing any previous entry.
    pub fn fit_column<'a, I>(&mut self, column: &str, values: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let distinct: BTreeSet<&str> = values.into_iter().collect();
        self.columns.insert(
            column.to_string(),
            distinct.into_iter().map(str::to_string).collect(),
        );
    }

    pub fn code(&self, column: &str, value: &str) -> Option<u32> {
        self.columns
            .get(column)?
            .binary_search_by(|probe| probe.as_str().cmp(value))
            .ok()
            .map(|idx| idx as u32)
    }

    pub fn value(&self, column: &str, code: u32) -> Option<&str> {
        self.columns
            .get(column)?
            .get(code as usize)
            .map(String::as_str)
    }

    pub fn categories(&self, column: &str) -> Option<&[String]> {
        self.columns.get(column).map(Vec::as_slice)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Encode one value, failing on values outside the table.
    pub fn encode(&self, column: &str, value: &str) -> Result<u32, SchemaError> {
        self.code(column, value)
            .ok_or_else(|| SchemaError::UnknownCategory {
                column: column.to_string(),
                value: value.to_string(),
            })
    }

    pub fn save(&self, path: &Path) -> Result<(), PricerError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, PricerError> {
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Encode a categorical column whose rows are all present.
///
/// With `fit` set the column's entry is rebuilt from the batch first; otherwise
/// the existing entry is used as-is.
pub fn encode_column(
    vocabulary: &mut Vocabulary,
    column: &str,
    values: &[Option<&str>],
    fit: bool,
) -> Result<Vec<u32>, SchemaError> {
    let mut present = Vec::with_capacity(values.len());
    for (row, value) in values.iter().enumerate() {
        match value {
            Some(v) => present.push(*v),
            None => {
                return Err(SchemaError::NullCategory {
                    column: column.to_string(),
                    row,
                })
            }
        }
    }

    if fit {
        vocabulary.fit_column(column, present.iter().copied());
    }

    present
        .into_iter()
        .map(|v| vocabulary.encode(column, v))
        .collect()
}
