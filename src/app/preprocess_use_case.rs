use std::path::Path;
use tracing::info;

use crate::error::Result;
use crate::pipeline::ingestion::{read_csv, write_clean_csv};
use crate::pipeline::orchestrator::{Pipeline, PreprocessArtifact, ProcessedBatch};

/// Where the pipeline gets its encoding from, and where a fitted encoding goes.
#[derive(Debug, Default)]
pub struct PreprocessOptions<'a> {
    /// Reuse a captured artifact instead of fitting one
    pub frozen: Option<PreprocessArtifact>,
    /// Write the artifact used for this run here
    pub artifact_out: Option<&'a Path>,
}

/// Clean a raw listings file into a model-ready file, fitting the encoding on it.
pub fn preprocess(input_path: &Path, output_path: &Path) -> Result<ProcessedBatch> {
    preprocess_with(input_path, output_path, PreprocessOptions::default())
}

/// Clean a raw listings file. Nothing is written when the batch is rejected.
pub fn preprocess_with(
    input_path: &Path,
    output_path: &Path,
    options: PreprocessOptions<'_>,
) -> Result<ProcessedBatch> {
    let batch = read_csv(input_path)?;

    let pipeline = match options.frozen {
        Some(artifact) => Pipeline::frozen(artifact)?,
        None => Pipeline::fit(),
    };
    let processed = pipeline.process(&batch)?;

    for (column, summary) in &processed.report.summaries {
        info!(
            "📊 {}: min={:.2} max={:.2} mean={:.2}",
            column, summary.min, summary.max, summary.mean
        );
    }

    write_clean_csv(&processed.table, output_path)?;
    if let Some(path) = options.artifact_out {
        processed.artifact.save(path)?;
        info!("💾 Saved preprocessing artifact to {}", path.display());
    }

    Ok(processed)
}
