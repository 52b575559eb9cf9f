//! Prometheus metrics for the preprocessing pipeline, serving and model loads.
//!
//! Recording is always cheap: without an installed recorder the macros are
//! no-ops, so library code records unconditionally.

use std::fmt;
use std::net::SocketAddr;
use tracing::{info, warn};

/// Every metric name the crate records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    PipelineRowsIn,
    PipelineRowsDropped,
    PipelineBatches,
    PredictRequests,
    PredictDuration,
    ModelLoads,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::PipelineRowsIn => "lp_pipeline_rows_in_total",
            MetricName::PipelineRowsDropped => "lp_pipeline_rows_dropped_total",
            MetricName::PipelineBatches => "lp_pipeline_batches_total",
            MetricName::PredictRequests => "lp_predict_requests_total",
            MetricName::PredictDuration => "lp_predict_duration_seconds",
            MetricName::ModelLoads => "lp_model_loads_total",
        }
    }

    pub fn all_metrics() -> impl Iterator<Item = MetricName> {
        [
            MetricName::PipelineRowsIn,
            MetricName::PipelineRowsDropped,
            MetricName::PipelineBatches,
            MetricName::PredictRequests,
            MetricName::PredictDuration,
            MetricName::ModelLoads,
        ]
        .into_iter()
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Install the Prometheus exporter when `PRICER_METRICS_ADDR` is set.
///
/// Must run inside a tokio runtime. Returns the bound address when installed.
pub fn init() -> Option<SocketAddr> {
    let raw = std::env::var("PRICER_METRICS_ADDR").ok()?;
    let addr: SocketAddr = match raw.parse() {
        Ok(addr) => addr,
        Err(e) => {
            warn!("Ignoring PRICER_METRICS_ADDR '{}': {}", raw, e);
            return None;
        }
    };

    let builder = metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(addr);
    match builder.install() {
        Ok(()) => {
            info!("📈 Prometheus exporter listening on http://{}/metrics", addr);
            Some(addr)
        }
        Err(e) => {
            warn!("Prometheus exporter install failed: {}", e);
            None
        }
    }
}

pub mod pipeline {
    use super::MetricName;

    pub fn rows_dropped(reason: &str, count: usize) {
        if count == 0 {
            return;
        }
        ::metrics::counter!(MetricName::PipelineRowsDropped.as_str(), "reason" => reason.to_string())
            .increment(count as u64);
    }

    pub fn batch_processed(rows_in: usize, rows_out: usize) {
        ::metrics::counter!(MetricName::PipelineBatches.as_str()).increment(1);
        ::metrics::counter!(MetricName::PipelineRowsIn.as_str()).increment(rows_in as u64);
        tracing::debug!(rows_in, rows_out, "batch metrics recorded");
    }
}

pub mod predict {
    use super::MetricName;

    pub fn request_completed(ok: bool, secs: f64) {
        let outcome = if ok { "ok" } else { "error" };
        ::metrics::counter!(MetricName::PredictRequests.as_str(), "outcome" => outcome).increment(1);
        ::metrics::histogram!(MetricName::PredictDuration.as_str()).record(secs);
    }
}

pub mod registry {
    use super::MetricName;

    pub fn model_loaded(ok: bool) {
        let outcome = if ok { "ok" } else { "error" };
        ::metrics::counter!(MetricName::ModelLoads.as_str(), "outcome" => outcome).increment(1);
    }
}
