use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::constants::{
    BATHROOMS, BATHROOMS_TEXT, CATEGORICAL_COLUMNS, FEATURE_COUNT, FEATURE_ORDER,
    IMPUTED_COLUMNS, NUMERIC_COLUMNS, PRICE, REQUIRED_FEATURE_COLUMNS,
};
use crate::domain::{CleanRow, CleanTable};
use crate::error::{PricerError, SchemaError};
use crate::observability::metrics;
use crate::pipeline::processing::encode::{encode_column, Vocabulary};
use crate::pipeline::processing::impute::Imputer;
use crate::pipeline::processing::normalize::{
    clean_prices, normalize_column, FieldNormalizer, NumericNormalizer, UnitTextNormalizer,
};
use crate::pipeline::report::{ColumnSummary, ParseWarning, PreprocessReport};
use crate::types::{RawBatch, RawRecord};

/// Everything a later run needs to encode listings exactly as a fitting run did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessArtifact {
    pub feature_order: Vec<String>,
    pub vocabulary: Vocabulary,
    pub imputation_medians: BTreeMap<String, f64>,
    pub created_at: DateTime<Utc>,
}

impl PreprocessArtifact {
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

    /// Whether this artifact was built for the feature order this crate emits.
    pub fn matches_feature_order(&self) -> bool {
        self.feature_order.iter().map(String::as_str).eq(FEATURE_ORDER)
    }
}

/// How categorical codes and fill values are obtained.
#[derive(Debug, Clone, PartialEq)]
pub enum EncodingMode {
    /// Learn the vocabulary and medians from the batch (training path)
    Fit,
    /// Reuse a previously captured artifact (serving / scoring path)
    Frozen(PreprocessArtifact),
}

/// Result of one pipeline pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedBatch {
    pub table: CleanTable,
    pub artifact: PreprocessArtifact,
    pub report: PreprocessReport,
}

/// Deterministic raw-batch to clean-table transform.
pub struct Pipeline {
    mode: EncodingMode,
}

impl Pipeline {
    pub fn fit() -> Self {
        Self {
            mode: EncodingMode::Fit,
        }
    }

    /// Encode with a saved artifact. Refuses one built for another feature order.
    pub fn frozen(artifact: PreprocessArtifact) -> Result<Self, SchemaError> {
        if !artifact.matches_feature_order() {
            return Err(SchemaError::ArtifactFeatureOrder {
                expected: FEATURE_ORDER.iter().map(|c| c.to_string()).collect(),
                actual: artifact.feature_order,
            });
        }
        Ok(Self {
            mode: EncodingMode::Frozen(artifact),
        })
    }

    pub fn mode(&self) -> &EncodingMode {
        &self.mode
    }

    fn is_fitting(&self) -> bool {
        matches!(self.mode, EncodingMode::Fit)
    }

    /// Run every stage over a batch.
    ///
    /// Fails without partial output when a required column is absent, when no
    /// row has a usable price, when a numeric column has no value to impute
    /// from, or when a categorical value cannot be encoded.
    pub fn process(&self, batch: &RawBatch) -> Result<ProcessedBatch, SchemaError> {
        let mut report = PreprocessReport {
            rows_in: batch.len(),
            ..PreprocessReport::default()
        };
        info!("🔄 Cleaning batch of {} rows", batch.len());

        validate_columns(batch, self.is_fitting())?;

        let (mut rows, duplicate_warning) = drop_duplicates(batch);
        if let Some(w) = duplicate_warning {
            warn!("{}", w);
            if let ParseWarning::DuplicateRows { dropped, .. } = w {
                metrics::pipeline::rows_dropped("duplicate", dropped);
            }
            report.warnings.push(w);
        }

        // Price is the target: unusable rows are removed, never imputed
        let has_price = batch.has_column(PRICE);
        let prices = if has_price {
            let cleaned = clean_prices(PRICE, rows.iter().map(|r| RawBatch::value(r, PRICE)))?;
            if let Some(w) = cleaned.warning {
                if let ParseWarning::DroppedRows { dropped, .. } = w {
                    metrics::pipeline::rows_dropped("price", dropped);
                }
                report.warnings.push(w);
            }
            rows = cleaned.kept_rows.iter().map(|i| rows[*i]).collect();
            Some(cleaned.prices)
        } else {
            None
        };

        let mut numeric: BTreeMap<&str, Vec<Option<f64>>> = BTreeMap::new();
        let bathrooms = UnitTextNormalizer;
        numeric.insert(
            BATHROOMS,
            normalize_column(&bathrooms, rows.iter().map(|r| RawBatch::value(r, BATHROOMS_TEXT))),
        );
        let coercer = NumericNormalizer;
        for column in NUMERIC_COLUMNS {
            numeric.insert(
                column,
                normalize_column(&coercer, rows.iter().map(|r| RawBatch::value(r, column))),
            );
        }
        debug!(
            "normalized {} numeric columns with '{}' and '{}'",
            numeric.len(),
            bathrooms.strategy(),
            coercer.strategy()
        );

        let imputer = match &self.mode {
            EncodingMode::Fit => Imputer::BatchMedian,
            EncodingMode::Frozen(artifact) => Imputer::Frozen(artifact.imputation_medians.clone()),
        };
        let mut imputed: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
        for column in IMPUTED_COLUMNS {
            let raw = numeric.remove(column).unwrap_or_default();
            let filled = imputer.impute(column, &raw)?;
            if filled.nulls_filled > 0 {
                debug!(
                    "imputed {} nulls in '{}' with {}",
                    filled.nulls_filled, column, filled.fill_value
                );
            }
            report
                .nulls_imputed
                .insert(column.to_string(), filled.nulls_filled);
            report
                .fill_values
                .insert(column.to_string(), filled.fill_value);
            imputed.insert(column, filled.values);
        }

        let mut vocabulary = match &self.mode {
            EncodingMode::Fit => Vocabulary::new(),
            EncodingMode::Frozen(artifact) => artifact.vocabulary.clone(),
        };
        let mut encoded: BTreeMap<&str, Vec<u32>> = BTreeMap::new();
        for column in CATEGORICAL_COLUMNS {
            let owned: Vec<Option<String>> = rows
                .iter()
                .map(|r| RawBatch::value(r, column).to_category())
                .collect();
            let values: Vec<Option<&str>> = owned.iter().map(Option::as_deref).collect();
            let codes = encode_column(&mut vocabulary, column, &values, self.is_fitting())?;
            encoded.insert(column, codes);
        }

        let table = assemble(rows.len(), prices, &imputed, &encoded);
        report.rows_out = table.len();
        for column in table.columns() {
            if let Some(summary) = table.column(column).and_then(ColumnSummary::of) {
                report.summaries.insert(column.to_string(), summary);
            }
        }

        let artifact = match &self.mode {
            EncodingMode::Fit => PreprocessArtifact {
                feature_order: FEATURE_ORDER.iter().map(|c| c.to_string()).collect(),
                vocabulary,
                imputation_medians: report.fill_values.clone(),
                created_at: Utc::now(),
            },
            EncodingMode::Frozen(artifact) => artifact.clone(),
        };

        metrics::pipeline::batch_processed(report.rows_in, report.rows_out);
        info!(
            "✅ Batch cleaned: {} rows in, {} rows out, {} warnings",
            report.rows_in,
            report.rows_out,
            report.warnings.len()
        );

        Ok(ProcessedBatch {
            table,
            artifact,
            report,
        })
    }
}

/// Reject a batch that lacks any required column, naming all of them.
pub fn validate_columns(batch: &RawBatch, require_price: bool) -> Result<(), SchemaError> {
    let mut required: Vec<&str> = Vec::with_capacity(REQUIRED_FEATURE_COLUMNS.len() + 1);
    if require_price {
        required.push(PRICE);
    }
    required.extend(REQUIRED_FEATURE_COLUMNS);

    let missing: Vec<String> = required
        .into_iter()
        .filter(|c| !batch.has_column(c))
        .map(str::to_string)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(SchemaError::MissingColumns(missing))
    }
}

/// Keep the first occurrence of each exact raw row.
fn drop_duplicates(batch: &RawBatch) -> (Vec<&RawRecord>, Option<ParseWarning>) {
    let mut seen = HashSet::with_capacity(batch.len());
    let mut kept = Vec::with_capacity(batch.len());
    for row in &batch.rows {
        let key = format!(
            "{:?}",
            batch
                .columns
                .iter()
                .map(|c| RawBatch::value(row, c))
                .collect::<Vec<_>>()
        );
        if seen.insert(key) {
            kept.push(row);
        }
    }
    let dropped = batch.len() - kept.len();
    let warning = (dropped > 0).then_some(ParseWarning::DuplicateRows {
        dropped,
        total: batch.len(),
    });
    (kept, warning)
}

fn assemble(
    len: usize,
    prices: Option<Vec<f64>>,
    imputed: &BTreeMap<&str, Vec<f64>>,
    encoded: &BTreeMap<&str, Vec<u32>>,
) -> CleanTable {
    let rows = (0..len)
        .map(|i| {
            let mut features = [0.0; FEATURE_COUNT];
            for (slot, name) in features.iter_mut().zip(FEATURE_ORDER) {
                *slot = match encoded.get(name) {
                    Some(codes) => f64::from(codes[i]),
                    None => imputed[name][i],
                };
            }
            CleanRow {
                features,
                price: prices.as_ref().map(|p| p[i]),
            }
        })
        .collect();

    CleanTable {
        rows,
        has_price: prices.is_some(),
    }
}
