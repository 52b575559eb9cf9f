use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Non-fatal diagnostics raised while cleaning a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParseWarning {
    /// Rows removed because a non-imputable column was unusable
    DroppedRows {
        column: String,
        dropped: usize,
        total: usize,
        percent: f64,
    },
    /// Exact duplicate raw rows removed before cleaning
    DuplicateRows { dropped: usize, total: usize },
}

impl ParseWarning {
    pub fn dropped_rows(column: &str, dropped: usize, total: usize) -> Self {
        let percent = if total == 0 {
            0.0
        } else {
            dropped as f64 / total as f64 * 100.0
        };
        ParseWarning::DroppedRows {
            column: column.to_string(),
            dropped,
            total,
            percent,
        }
    }
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseWarning::DroppedRows {
                column,
                dropped,
                total,
                percent,
            } => write!(
                f,
                "Dropped {dropped} of {total} rows ({percent:.1}%) with unusable '{column}'"
            ),
            ParseWarning::DuplicateRows { dropped, total } => {
                write!(f, "Dropped {dropped} duplicate rows out of {total}")
            }
        }
    }
}

/// Min / max / mean of one output column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl ColumnSummary {
    pub fn of(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for v in values {
            count += 1;
            sum += v;
            min = min.min(v);
            max = max.max(v);
        }
        (count > 0).then(|| ColumnSummary {
            min,
            max,
            mean: sum / count as f64,
        })
    }
}

/// What a pipeline run did to its batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreprocessReport {
    pub rows_in: usize,
    pub rows_out: usize,
    pub warnings: Vec<ParseWarning>,
    /// Nulls found per numeric column before imputation
    pub nulls_imputed: BTreeMap<String, usize>,
    /// Fill value used per numeric column
    pub fill_values: BTreeMap<String, f64>,
    pub summaries: BTreeMap<String, ColumnSummary>,
}

impl PreprocessReport {
    pub fn dropped_rows(&self) -> usize {
        self.rows_in.saturating_sub(self.rows_out)
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}
