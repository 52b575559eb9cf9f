use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

use crate::app::ports::ModelLoaderPort;
use crate::constants::FEATURE_ORDER;
use crate::domain::FeatureFrame;
use crate::error::PredictError;
use crate::observability::metrics;
use crate::types::RawBatch;

/// Build a one-row frame in feature order from a name-to-value mapping.
///
/// The mapping must hold exactly the model features, already encoded with the
/// vocabulary frozen at training time.
pub fn frame_from_features(features: &BTreeMap<String, f64>) -> Result<FeatureFrame, PredictError> {
    let missing: Vec<String> = FEATURE_ORDER
        .iter()
        .filter(|f| !features.contains_key(**f))
        .map(|f| f.to_string())
        .collect();
    let unexpected: Vec<String> = features
        .keys()
        .filter(|k| !FEATURE_ORDER.contains(&k.as_str()))
        .cloned()
        .collect();
    if !missing.is_empty() || !unexpected.is_empty() {
        return Err(PredictError::InvalidFeatures {
            missing,
            unexpected,
        });
    }

    let row = FEATURE_ORDER.iter().map(|f| features[*f]).collect();
    Ok(FeatureFrame::from_rows(vec![row]))
}

/// Use case for serving single-listing price predictions
pub struct PredictUseCase {
    loader: Arc<dyn ModelLoaderPort>,
}

impl PredictUseCase {
    pub fn new(loader: Arc<dyn ModelLoaderPort>) -> Self {
        Self { loader }
    }

    /// Predict a nightly price in original units.
    pub async fn predict(
        &self,
        features: &BTreeMap<String, f64>,
        model_uri: &str,
    ) -> Result<f64, PredictError> {
        let started = Instant::now();
        let result = self.run(features, model_uri).await;
        metrics::predict::request_completed(result.is_ok(), started.elapsed().as_secs_f64());
        if let Err(e) = &result {
            error!(model_uri = %model_uri, "Prediction failed: {}", e);
        }
        result
    }

    /// Price raw listings with the preprocessing bundled in the model artifact.
    pub async fn predict_listings(
        &self,
        batch: &RawBatch,
        model_uri: &str,
    ) -> Result<Vec<f64>, PredictError> {
        let started = Instant::now();
        let result = match self.loader.load_model(model_uri).await {
            Ok(model) => model.predict_listings(batch),
            Err(e) => Err(PredictError::ModelUnavailable(e.to_string())),
        };
        metrics::predict::request_completed(result.is_ok(), started.elapsed().as_secs_f64());
        if let Err(e) = &result {
            error!(model_uri = %model_uri, "Scoring {} listings failed: {}", batch.len(), e);
        }
        result
    }

    async fn run(
        &self,
        features: &BTreeMap<String, f64>,
        model_uri: &str,
    ) -> Result<f64, PredictError> {
        let frame = frame_from_features(features)?;
        let model = self
            .loader
            .load_model(model_uri)
            .await
            .map_err(|e| PredictError::ModelUnavailable(e.to_string()))?;

        let raw = model.predict_raw(&frame)?;
        let raw = raw
            .first()
            .copied()
            .ok_or_else(|| PredictError::Model("model returned no output".to_string()))?;
        let price = model.target_transform.inverse(raw);
        debug!(raw, price, "prediction computed");
        Ok(price)
    }
}

/// Free-function form of [`PredictUseCase::predict`].
pub async fn predict(
    features: &BTreeMap<String, f64>,
    model_uri: &str,
    loader: Arc<dyn ModelLoaderPort>,
) -> Result<f64, PredictError> {
    PredictUseCase::new(loader).predict(features, model_uri).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegistryError;
    use crate::model::{ModelArtifact, ModelKind};
    use async_trait::async_trait;

    struct FixedModel(Arc<ModelArtifact>);

    #[async_trait]
    impl ModelLoaderPort for FixedModel {
        async fn load_model(&self, _uri: &str) -> Result<Arc<ModelArtifact>, RegistryError> {
            Ok(self.0.clone())
        }
    }

    struct BrokenLoader;

    #[async_trait]
    impl ModelLoaderPort for BrokenLoader {
        async fn load_model(&self, _uri: &str) -> Result<Arc<ModelArtifact>, RegistryError> {
            Err(RegistryError::NotFound("model not found".to_string()))
        }
    }

    fn constant_model(raw: f64) -> Arc<ModelArtifact> {
        Arc::new(ModelArtifact::new(
            "test",
            ModelKind::Linear {
                intercept: raw,
                coefficients: vec![0.0; 9],
            },
            None,
        ))
    }

    fn sample_features() -> BTreeMap<String, f64> {
        [
            ("room_type", 0.0),
            ("neighbourhood_cleansed", 7.0),
            ("accommodates", 2.0),
            ("bedrooms", 1.0),
            ("bathrooms", 1.0),
            ("number_of_reviews", 20.0),
            ("review_scores_rating", 4.5),
            ("availability_365", 120.0),
            ("minimum_nights", 2.0),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }

    #[tokio::test]
    async fn test_prediction_is_inverted_from_log_space() {
        let use_case = PredictUseCase::new(Arc::new(FixedModel(constant_model(150.0_f64.ln_1p()))));
        let price = use_case
            .predict(&sample_features(), "models:/test@champion")
            .await
            .unwrap();
        assert!((price - 150.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_missing_feature_is_rejected() {
        let use_case = PredictUseCase::new(Arc::new(FixedModel(constant_model(1.0))));
        let mut features = sample_features();
        features.remove("bedrooms");
        features.insert("bathrooms_text".to_string(), 1.0);

        match use_case.predict(&features, "models:/test@champion").await {
            Err(PredictError::InvalidFeatures {
                missing,
                unexpected,
            }) => {
                assert_eq!(missing, vec!["bedrooms"]);
                assert_eq!(unexpected, vec!["bathrooms_text"]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_loader_failure_keeps_message() {
        let use_case = PredictUseCase::new(Arc::new(BrokenLoader));
        let err = use_case
            .predict(&sample_features(), "models:/test@champion")
            .await
            .unwrap_err();
        assert!(matches!(err, PredictError::ModelUnavailable(_)));
        assert!(err.to_string().contains("model not found"));
    }

    #[test]
    fn test_frame_follows_feature_order() {
        let frame = frame_from_features(&sample_features()).unwrap();
        assert_eq!(frame.columns[4], "bathrooms");
        assert_eq!(frame.rows[0][4], 1.0);
        assert_eq!(frame.rows[0][1], 7.0);
    }

    #[tokio::test]
    async fn test_raw_listings_need_bundled_preprocessing() {
        let use_case = PredictUseCase::new(Arc::new(FixedModel(constant_model(1.0))));
        let err = use_case
            .predict_listings(&RawBatch::default(), "models:/test@champion")
            .await
            .unwrap_err();
        assert!(matches!(err, PredictError::MissingPreprocessing(_)));
    }
}
