use serde::{Deserialize, Serialize};

/// Monotonic reparameterization of the price target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetTransform {
    /// `ln(1 + y)` before fitting, `exp(y) - 1` after inference
    #[default]
    Log1p,
    Identity,
}

impl TargetTransform {
    pub fn forward(self, y: f64) -> f64 {
        match self {
            TargetTransform::Log1p => y.ln_1p(),
            TargetTransform::Identity => y,
        }
    }

    pub fn inverse(self, y_hat: f64) -> f64 {
        match self {
            TargetTransform::Log1p => y_hat.exp_m1(),
            TargetTransform::Identity => y_hat,
        }
    }

    pub fn forward_all(self, ys: &[f64]) -> Vec<f64> {
        ys.iter().map(|y| self.forward(*y)).collect()
    }

    pub fn inverse_all(self, ys: &[f64]) -> Vec<f64> {
        ys.iter().map(|y| self.inverse(*y)).collect()
    }
}
