use std::collections::BTreeMap;

use crate::error::SchemaError;

/// Median of a slice, averaging the two middle values for even lengths.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// A numeric column after imputation.
#[derive(Debug, Clone, PartialEq)]
pub struct ImputedColumn {
    pub values: Vec<f64>,
    pub fill_value: f64,
    pub nulls_filled: usize,
}

/// Where fill values come from.
#[derive(Debug, Clone, PartialEq)]
pub enum Imputer {
    /// Median of the non-null values in the batch being processed
    BatchMedian,
    /// Medians captured from a training batch
    Frozen(BTreeMap<String, f64>),
}

impl Imputer {
    /// Fill the nulls of one column.
    ///
    /// A frozen imputer uses the stored median for the column when it has
    /// one and the batch median otherwise. A column with no usable value and
    /// no stored median is a schema error.
    pub fn impute(&self, column: &str, values: &[Option<f64>]) -> Result<ImputedColumn, SchemaError> {
        let present: Vec<f64> = values.iter().flatten().copied().collect();
        let nulls_filled = values.len() - present.len();

        let stored = match self {
            Imputer::BatchMedian => None,
            Imputer::Frozen(medians) => medians.get(column).copied(),
        };
        let fill_value = stored
            .or_else(|| median(&present))
            .ok_or_else(|| SchemaError::EmptyColumn(column.to_string()))?;

        Ok(ImputedColumn {
            values: values.iter().map(|v| v.unwrap_or(fill_value)).collect(),
            fill_value,
            nulls_filled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn batch_median_fills_every_null() {
        let column = vec![Some(1.0), None, Some(2.0), None, Some(10.0)];
        let imputed = Imputer::BatchMedian.impute("bedrooms", &column).unwrap();
        assert_eq!(imputed.values, vec![1.0, 2.0, 2.0, 2.0, 10.0]);
        assert_eq!(imputed.nulls_filled, 2);
        assert_eq!(imputed.fill_value, 2.0);
    }

    #[test]
    fn all_null_column_is_an_error_in_batch_mode() {
        let err = Imputer::BatchMedian.impute("bedrooms", &[None, None]).unwrap_err();
        assert_eq!(err, SchemaError::EmptyColumn("bedrooms".into()));
    }

    #[test]
    fn frozen_median_wins_over_batch() {
        let mut medians = BTreeMap::new();
        medians.insert("bedrooms".to_string(), 1.0);
        let imputed = Imputer::Frozen(medians).impute("bedrooms", &[None, Some(5.0)]).unwrap();
        assert_eq!(imputed.values, vec![1.0, 5.0]);
    }

    #[test]
    fn frozen_median_covers_single_null_row() {
        let mut medians = BTreeMap::new();
        medians.insert("review_scores_rating".to_string(), 4.6);
        let imputed = Imputer::Frozen(medians)
            .impute("review_scores_rating", &[None])
            .unwrap();
        assert_eq!(imputed.values, vec![4.6]);
    }
}
