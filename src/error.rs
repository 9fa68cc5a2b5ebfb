//! Error types for the transit demand engine

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// Training input is malformed (missing or invalid target, bad row)
    #[error("Schema error: {0}")]
    Schema(String),

    /// No training records were supplied
    #[error("Dataset is empty")]
    EmptyDataset,

    /// Training partition too small to grow a tree
    #[error("Insufficient data: need at least {required} training samples, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    /// No bundle has been trained or loaded yet
    #[error("Model not loaded: train or load a model bundle first")]
    ModelNotLoaded,

    /// A bundle is loaded but carries no evaluation metrics
    #[error("Metrics not available for the loaded model")]
    MetricsUnavailable,

    /// A context field is present but cannot be coerced to a number
    #[error("Malformed feature `{field}`: {value}")]
    MalformedFeature { field: &'static str, value: String },

    /// A request body that is not a JSON object of context fields
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// A bundle entry is absent or unreadable
    #[error("Artifact `{entry}` not found at {path:?}")]
    ArtifactNotFound { entry: &'static str, path: PathBuf },

    /// A bundle entry deserialized into something structurally invalid
    #[error("Artifact `{entry}` is corrupt: {reason}")]
    ArtifactCorrupt { entry: &'static str, reason: String },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Stable identifier reported by the serving boundary
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Schema(_) => "schema_error",
            Error::EmptyDataset => "empty_dataset",
            Error::InsufficientData { .. } => "insufficient_data",
            Error::ModelNotLoaded => "model_not_loaded",
            Error::MetricsUnavailable => "metrics_unavailable",
            Error::MalformedFeature { .. } => "malformed_feature",
            Error::MalformedRequest(_) => "malformed_request",
            Error::ArtifactNotFound { .. } => "artifact_not_found",
            Error::ArtifactCorrupt { .. } => "artifact_corrupt",
            Error::Config(_) => "config_error",
            Error::Io(_) => "io_error",
            Error::Csv(_) => "csv_error",
            Error::Json(_) => "json_error",
        }
    }

    /// HTTP-like status code for this error kind
    pub fn status_code(&self) -> u16 {
        match self {
            Error::MalformedFeature { .. } | Error::MalformedRequest(_) => 400,
            Error::ModelNotLoaded | Error::MetricsUnavailable => 404,
            Error::Schema(_) | Error::EmptyDataset | Error::InsufficientData { .. } => 422,
            Error::ArtifactNotFound { .. }
            | Error::ArtifactCorrupt { .. }
            | Error::Config(_)
            | Error::Io(_)
            | Error::Csv(_)
            | Error::Json(_) => 500,
        }
    }

    /// Whether the caller's input caused the failure
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}
