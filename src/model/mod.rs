//! Model artifacts and the regressors they carry.
//!
//! An artifact bundles everything serving needs besides the features
//! themselves: the feature order the model was fitted on, the target
//! transform, the preprocessing artifact (vocabulary and medians), and the
//! regressor parameters.

pub mod reference;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::constants::FEATURE_ORDER;
use crate::domain::FeatureFrame;
use crate::error::PredictError;
use crate::pipeline::orchestrator::{Pipeline, PreprocessArtifact};
use crate::pipeline::processing::target::TargetTransform;
use crate::types::RawBatch;

pub use reference::{ModelRef, ModelSelector};

/// Anything that maps a feature frame to one raw output per row.
pub trait Regressor: Send + Sync {
    fn predict(&self, frame: &FeatureFrame) -> Result<Vec<f64>, PredictError>;
}

/// One node of a regression tree. Leaves carry `leaf`; splits send rows with
/// `value < threshold` to `left`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split_feature: Option<usize>,
    #[serde(default)]
    pub threshold: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<usize>,
    #[serde(default)]
    pub leaf: f64,
}

impl TreeNode {
    pub fn leaf(value: f64) -> Self {
        Self {
            split_feature: None,
            threshold: 0.0,
            left: None,
            right: None,
            leaf: value,
        }
    }

    pub fn split(feature: usize, threshold: f64, left: usize, right: usize) -> Self {
        Self {
            split_feature: Some(feature),
            threshold,
            left: Some(left),
            right: Some(right),
            leaf: 0.0,
        }
    }
}

/// Flat array of nodes; node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<TreeNode>,
}

impl RegressionTree {
    fn evaluate(&self, row: &[f64]) -> Result<f64, PredictError> {
        let mut idx = 0usize;
        // A well-formed tree reaches a leaf in at most nodes.len() steps
        for _ in 0..=self.nodes.len() {
            let node = self
                .nodes
                .get(idx)
                .ok_or_else(|| PredictError::Model(format!("tree references missing node {idx}")))?;
            match (node.split_feature, node.left, node.right) {
                (Some(feature), Some(left), Some(right)) => {
                    let value = row.get(feature).copied().ok_or_else(|| {
                        PredictError::Model(format!("split on missing feature index {feature}"))
                    })?;
                    idx = if value < node.threshold { left } else { right };
                }
                _ => return Ok(node.leaf),
            }
        }
        Err(PredictError::Model("tree contains a cycle".to_string()))
    }
}

/// Supported regressor families.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelKind {
    Linear {
        intercept: f64,
        coefficients: Vec<f64>,
    },
    /// Additive tree ensemble: base score plus the leaf of every tree
    TreeEnsemble {
        base_score: f64,
        trees: Vec<RegressionTree>,
    },
}

impl Regressor for ModelKind {
    fn predict(&self, frame: &FeatureFrame) -> Result<Vec<f64>, PredictError> {
        frame
            .rows
            .iter()
            .map(|row| match self {
                ModelKind::Linear {
                    intercept,
                    coefficients,
                } => {
                    if coefficients.len() != row.len() {
                        return Err(PredictError::Model(format!(
                            "expected {} features, got {}",
                            coefficients.len(),
                            row.len()
                        )));
                    }
                    Ok(intercept + coefficients.iter().zip(row).map(|(c, x)| c * x).sum::<f64>())
                }
                ModelKind::TreeEnsemble { base_score, trees } => trees
                    .iter()
                    .try_fold(*base_score, |acc, tree| -> Result<f64, PredictError> {
                        Ok(acc + tree.evaluate(row)?)
                    }),
            })
            .collect()
    }
}

/// A loadable, versioned model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub name: String,
    #[serde(default)]
    pub version: u32,
    pub feature_order: Vec<String>,
    #[serde(default)]
    pub target_transform: TargetTransform,
    pub preprocessing: Option<PreprocessArtifact>,
    pub model: ModelKind,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl ModelArtifact {
    pub fn new(name: &str, model: ModelKind, preprocessing: Option<PreprocessArtifact>) -> Self {
        Self {
            name: name.to_string(),
            version: 0,
            feature_order: FEATURE_ORDER.iter().map(|c| c.to_string()).collect(),
            target_transform: TargetTransform::Log1p,
            preprocessing,
            model,
            created_at: Utc::now(),
        }
    }

    /// Bundle the preprocessing the model was trained behind.
    pub fn attach_preprocessing(&mut self, artifact: PreprocessArtifact) -> Result<(), PredictError> {
        if artifact.feature_order != self.feature_order {
            return Err(PredictError::FeatureOrderMismatch {
                expected: self.feature_order.clone(),
                actual: artifact.feature_order,
            });
        }
        self.preprocessing = Some(artifact);
        Ok(())
    }

    /// Frozen pipeline that turns raw listings into this model's features.
    pub fn scoring_pipeline(&self) -> Result<Pipeline, PredictError> {
        let artifact = self
            .preprocessing
            .clone()
            .ok_or_else(|| PredictError::MissingPreprocessing(self.name.clone()))?;
        if artifact.feature_order != self.feature_order {
            return Err(PredictError::FeatureOrderMismatch {
                expected: self.feature_order.clone(),
                actual: artifact.feature_order,
            });
        }
        Ok(Pipeline::frozen(artifact)?)
    }

    /// Price raw listings: frozen preprocessing, then the model.
    pub fn predict_listings(&self, batch: &RawBatch) -> Result<Vec<f64>, PredictError> {
        let processed = self.scoring_pipeline()?.process(batch)?;
        self.predict_prices(&processed.table.feature_frame())
    }

    /// Hex SHA-256 of the serialized artifact.
    pub fn checksum(&self) -> Result<String, serde_json::Error> {
        let bytes = serde_json::to_vec(self)?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }

    /// Predict on a frame whose columns must match the fitted order exactly.
    /// Returns raw model output, still in the transformed target domain.
    pub fn predict_raw(&self, frame: &FeatureFrame) -> Result<Vec<f64>, PredictError> {
        if frame.columns != self.feature_order {
            return Err(PredictError::FeatureOrderMismatch {
                expected: self.feature_order.clone(),
                actual: frame.columns.clone(),
            });
        }
        self.model.predict(frame)
    }

    /// Predict on a frame and map the output back to price units.
    pub fn predict_prices(&self, frame: &FeatureFrame) -> Result<Vec<f64>, PredictError> {
        let raw = self.predict_raw(frame)?;
        Ok(self.target_transform.inverse_all(&raw))
    }
}

impl Regressor for ModelArtifact {
    fn predict(&self, frame: &FeatureFrame) -> Result<Vec<f64>, PredictError> {
        self.predict_raw(frame)
    }
}
