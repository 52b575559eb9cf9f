use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::config::TrainingConfig;
use crate::constants::PRICE;
use crate::domain::{CleanTable, FeatureFrame};
use crate::error::{PredictError, SchemaError};
use crate::model::Regressor;
use crate::pipeline::processing::outliers::{OutlierCap, OutlierCapper};
use crate::pipeline::processing::target::TargetTransform;

/// Features with their targets in the transformed (log) domain.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSet {
    pub frame: FeatureFrame,
    pub targets: Vec<f64>,
}

impl TrainingSet {
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Error metrics on the original price scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub mae: f64,
    pub r2: f64,
}

/// What a training preparation run did, kept next to the model it feeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRunMetadata {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub price_cap: OutlierCap,
    pub target_transform: TargetTransform,
    pub test_fraction: f64,
    pub seed: u64,
    pub train_rows: usize,
    pub test_rows: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<EvaluationMetrics>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreparedTraining {
    pub train: TrainingSet,
    pub test: TrainingSet,
    pub metadata: TrainingRunMetadata,
}

/// Cap price outliers, log-transform the target and split deterministically.
pub fn prepare_training(
    table: &CleanTable,
    config: &TrainingConfig,
) -> Result<PreparedTraining, SchemaError> {
    if !table.has_price {
        return Err(SchemaError::MissingColumns(vec![PRICE.to_string()]));
    }
    let prices = table.prices();
    let (kept, price_cap) = OutlierCapper::new(config.outlier_quantile)
        .cap(&prices)
        .ok_or_else(|| SchemaError::EmptyColumn(PRICE.to_string()))?;
    info!(
        "✂️ Price cap at q={}: {:.2} ({} -> {} rows)",
        price_cap.quantile, price_cap.threshold, price_cap.rows_before, price_cap.rows_after
    );

    let capped = table.select(&kept);
    let mut order: Vec<usize> = (0..capped.len()).collect();
    let mut rng = StdRng::seed_from_u64(config.seed);
    order.shuffle(&mut rng);

    let test_rows = ((capped.len() as f64) * config.test_fraction).ceil() as usize;
    let test_rows = test_rows.min(capped.len());
    let (test_idx, train_idx) = order.split_at(test_rows);

    let transform = TargetTransform::Log1p;
    let to_set = |indices: &[usize]| {
        let subset = capped.select(indices);
        TrainingSet {
            frame: subset.feature_frame(),
            targets: transform.forward_all(&subset.prices()),
        }
    };
    let train = to_set(train_idx);
    let test = to_set(test_idx);

    let metadata = TrainingRunMetadata {
        run_id: Uuid::new_v4(),
        started_at: Utc::now(),
        price_cap,
        target_transform: transform,
        test_fraction: config.test_fraction,
        seed: config.seed,
        train_rows: train.len(),
        test_rows: test.len(),
        metrics: None,
    };

    Ok(PreparedTraining {
        train,
        test,
        metadata,
    })
}

/// Score a regressor on a held-out set after undoing the target transform.
pub fn evaluate(
    regressor: &dyn Regressor,
    set: &TrainingSet,
    transform: TargetTransform,
) -> Result<EvaluationMetrics, PredictError> {
    if set.is_empty() {
        return Err(PredictError::Model("evaluation set is empty".to_string()));
    }
    let predicted = transform.inverse_all(&regressor.predict(&set.frame)?);
    let actual = transform.inverse_all(&set.targets);

    let n = actual.len() as f64;
    let mae = predicted
        .iter()
        .zip(&actual)
        .map(|(p, a)| (p - a).abs())
        .sum::<f64>()
        / n;
    let mean = actual.iter().sum::<f64>() / n;
    let ss_res: f64 = predicted.iter().zip(&actual).map(|(p, a)| (a - p).powi(2)).sum();
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
    let r2 = if ss_tot == 0.0 { 0.0 } else { 1.0 - ss_res / ss_tot };

    Ok(EvaluationMetrics { mae, r2 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CleanRow;
    use crate::model::ModelKind;

    fn table(prices: &[f64]) -> CleanTable {
        CleanTable {
            rows: prices
                .iter()
                .enumerate()
                .map(|(i, p)| CleanRow {
                    features: [0.0, 0.0, i as f64, 1.0, 1.0, 0.0, 4.5, 100.0, 1.0],
                    price: Some(*p),
                })
                .collect(),
            has_price: true,
        }
    }

    #[test]
    fn test_split_is_deterministic_for_a_seed() {
        let prices: Vec<f64> = (1..=50).map(|p| p as f64 * 10.0).collect();
        let t = table(&prices);
        let config = TrainingConfig::default();
        let a = prepare_training(&t, &config).unwrap();
        let b = prepare_training(&t, &config).unwrap();
        assert_eq!(a.train, b.train);
        assert_eq!(a.test, b.test);
    }

    #[test]
    fn test_outliers_are_removed_before_split() {
        let mut prices: Vec<f64> = (1..=99).map(|p| p as f64).collect();
        prices.push(100_000.0);
        let prepared = prepare_training(&table(&prices), &TrainingConfig::default()).unwrap();

        let meta = &prepared.metadata;
        assert_eq!(meta.price_cap.rows_before, 100);
        assert!(meta.price_cap.rows_after < 100);
        assert_eq!(meta.train_rows + meta.test_rows, meta.price_cap.rows_after);
        let cap_log = 100_000.0_f64.ln_1p();
        assert!(prepared
            .train
            .targets
            .iter()
            .chain(&prepared.test.targets)
            .all(|t| *t < cap_log));
    }

    #[test]
    fn test_targets_are_log_transformed() {
        let prepared = prepare_training(&table(&[100.0, 100.0, 100.0]), &TrainingConfig::default()).unwrap();
        assert!(prepared.train.targets.iter().all(|t| (t - 100.0_f64.ln_1p()).abs() < 1e-12));
        assert_eq!(prepared.test.len(), 1);
    }

    #[test]
    fn test_table_without_price_is_rejected() {
        let mut t = table(&[1.0]);
        t.has_price = false;
        assert!(prepare_training(&t, &TrainingConfig::default()).is_err());
    }

    #[test]
    fn test_evaluate_reports_in_price_units() {
        let prepared = prepare_training(&table(&[100.0; 10]), &TrainingConfig::default()).unwrap();
        // Always predicts 110 in price units
        let model = ModelKind::Linear {
            intercept: 110.0_f64.ln_1p(),
            coefficients: vec![0.0; 9],
        };
        let metrics = evaluate(&model, &prepared.test, TargetTransform::Log1p).unwrap();
        assert!((metrics.mae - 10.0).abs() < 1e-6);
        // Constant actuals leave no variance to explain
        assert_eq!(metrics.r2, 0.0);
    }
}
