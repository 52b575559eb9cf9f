use serde::{Deserialize, Serialize};

/// Quantile with linear interpolation between the closest ranks.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}

/// Outcome of capping a target column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierCap {
    pub quantile: f64,
    pub threshold: f64,
    pub rows_before: usize,
    pub rows_after: usize,
}

/// Drops rows whose target exceeds a percentile threshold. Training side only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlierCapper {
    pub quantile: f64,
}

impl Default for OutlierCapper {
    fn default() -> Self {
        Self { quantile: 0.99 }
    }
}

impl OutlierCapper {
    pub fn new(quantile: f64) -> Self {
        Self { quantile }
    }

    /// Indices of the rows to keep, with the recorded threshold.
    /// Returns `None` for an empty target or an out-of-range quantile.
    pub fn cap(&self, targets: &[f64]) -> Option<(Vec<usize>, OutlierCap)> {
        let threshold = quantile(targets, self.quantile)?;
        let kept: Vec<usize> = targets
            .iter()
            .enumerate()
            .filter(|(_, y)| **y <= threshold)
            .map(|(i, _)| i)
            .collect();
        let cap = OutlierCap {
            quantile: self.quantile,
            threshold,
            rows_before: targets.len(),
            rows_after: kept.len(),
        };
        Some((kept, cap))
    }
}
