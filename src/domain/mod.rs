// Clean, model-ready shapes shared by the pipeline, training and serving layers

use serde::{Deserialize, Serialize};

use crate::constants::{feature_index, FEATURE_COUNT, FEATURE_ORDER, PRICE};

/// One cleaned listing: features in [`FEATURE_ORDER`] and, on the training
/// path, its price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CleanRow {
    pub features: [f64; FEATURE_COUNT],
    pub price: Option<f64>,
}

impl CleanRow {
    pub fn feature(&self, name: &str) -> Option<f64> {
        feature_index(name).map(|i| self.features[i])
    }
}

/// Output of the cleaning pipeline. Every cell is a finite number.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleanTable {
    pub rows: Vec<CleanRow>,
    /// Whether the batch carried a price column
    pub has_price: bool,
}

impl CleanTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Output column names: `price` first when present, then the features.
    pub fn columns(&self) -> Vec<&'static str> {
        let mut cols = Vec::with_capacity(FEATURE_COUNT + 1);
        if self.has_price {
            cols.push(PRICE);
        }
        cols.extend(FEATURE_ORDER);
        cols
    }

    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        if name == PRICE {
            return self
                .has_price
                .then(|| self.rows.iter().filter_map(|r| r.price).collect());
        }
        let idx = feature_index(name)?;
        Some(self.rows.iter().map(|r| r.features[idx]).collect())
    }

    pub fn prices(&self) -> Vec<f64> {
        self.rows.iter().filter_map(|r| r.price).collect()
    }

    /// Rows in output column order.
    pub fn records(&self) -> impl Iterator<Item = Vec<f64>> + '_ {
        self.rows.iter().map(move |row| {
            let mut record = Vec::with_capacity(FEATURE_COUNT + 1);
            if self.has_price {
                record.push(row.price.unwrap_or(f64::NAN));
            }
            record.extend_from_slice(&row.features);
            record
        })
    }

    pub fn feature_frame(&self) -> FeatureFrame {
        FeatureFrame::from_rows(self.rows.iter().map(|r| r.features.to_vec()).collect())
    }

    pub fn select(&self, indices: &[usize]) -> CleanTable {
        CleanTable {
            rows: indices.iter().filter_map(|i| self.rows.get(*i).copied()).collect(),
            has_price: self.has_price,
        }
    }
}

/// The table handed to a regressor: named columns, row-major values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureFrame {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl FeatureFrame {
    /// Frame whose columns follow [`FEATURE_ORDER`].
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Self {
        Self {
            columns: FEATURE_ORDER.iter().map(|c| c.to_string()).collect(),
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{BATHROOMS, ROOM_TYPE};

    fn row(price: Option<f64>) -> CleanRow {
        CleanRow {
            features: [0.0, 1.0, 2.0, 1.0, 1.5, 10.0, 4.5, 100.0, 2.0],
            price,
        }
    }

    #[test]
    fn columns_put_price_first() {
        let table = CleanTable {
            rows: vec![row(Some(100.0))],
            has_price: true,
        };
        let cols = table.columns();
        assert_eq!(cols[0], PRICE);
        assert_eq!(cols.len(), 10);
        assert_eq!(table.records().next().unwrap()[0], 100.0);
    }

    #[test]
    fn named_lookup_follows_feature_order() {
        let r = row(None);
        assert_eq!(r.feature(BATHROOMS), Some(1.5));
        assert_eq!(r.feature(ROOM_TYPE), Some(0.0));
        assert_eq!(r.feature("bathrooms_text"), None);
    }

    #[test]
    fn serving_table_has_no_price_column() {
        let table = CleanTable {
            rows: vec![row(None)],
            has_price: false,
        };
        assert!(!table.columns().contains(&PRICE));
        assert_eq!(table.column(PRICE), None);
        assert_eq!(table.feature_frame().columns.len(), FEATURE_COUNT);
    }
}
