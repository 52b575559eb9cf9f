// Listing preprocessing: ingestion, per-column processing and the orchestrator

pub mod ingestion;
pub mod orchestrator;
pub mod processing;
pub mod report;

pub use orchestrator::{EncodingMode, Pipeline, PreprocessArtifact, ProcessedBatch};
pub use report::{ParseWarning, PreprocessReport};
