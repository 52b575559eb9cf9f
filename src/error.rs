use thiserror::Error;

/// A batch that cannot be turned into a clean table. Fatal to the whole batch.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("column '{0}' is empty for all rows")]
    EmptyColumn(String),

    #[error("column '{column}' has value '{value}' that is not in the vocabulary")]
    UnknownCategory { column: String, value: String },

    #[error("column '{column}' is null at row {row}")]
    NullCategory { column: String, row: usize },

    #[error("preprocessing artifact has feature order [{}], expected [{}]", .actual.join(", "), .expected.join(", "))]
    ArtifactFeatureOrder {
        expected: Vec<String>,
        actual: Vec<String>,
    },
}

/// Failures of a model registry lookup or write.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("invalid model reference '{0}': expected models:/<name>@<alias> or models:/<name>/<version>")]
    InvalidReference(String),

    #[error("model not found: {0}")]
    NotFound(String),

    #[error("artifact checksum mismatch for {0}")]
    ChecksumMismatch(String),

    #[error("registry I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("artifact JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("registry HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("registry configuration error: {0}")]
    Config(String),

    #[error("registry returned no version for {0}")]
    Unversioned(String),
}

/// Failures of a single prediction.
#[derive(Error, Debug)]
pub enum PredictError {
    /// The artifact could not be loaded. Carries the loader's message verbatim.
    #[error("{0}")]
    ModelUnavailable(String),

    #[error("invalid features: missing [{}], unexpected [{}]", .missing.join(", "), .unexpected.join(", "))]
    InvalidFeatures {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    #[error("feature order mismatch: model expects [{}], got [{}]", .expected.join(", "), .actual.join(", "))]
    FeatureOrderMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("model evaluation failed: {0}")]
    Model(String),

    #[error("model '{0}' carries no preprocessing artifact")]
    MissingPreprocessing(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl From<RegistryError> for PredictError {
    fn from(err: RegistryError) -> Self {
        PredictError::ModelUnavailable(err.to_string())
    }
}

/// Crate-level error for file-based entry points.
#[derive(Error, Debug)]
pub enum PricerError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Predict(#[from] PredictError),
}

pub type Result<T> = std::result::Result<T, PricerError>;
