//! Error types for the prediction pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading data, building features or predicting.
///
/// Every variant is terminal for the request that raised it. The session
/// layer renders it as a diagnostic and keeps going.
#[derive(Debug, Error)]
pub enum PredictError {
    /// Historical data or artifact path does not exist
    #[error("not found: {what} ({})", .path.display())]
    NotFound { what: String, path: PathBuf },

    /// Key columns required by the encoding strategy are absent
    #[error("missing columns: {0}")]
    MissingColumns(String),

    /// Declared feature list shares no column with the table
    #[error("invalid feature spec: {0}")]
    InvalidFeatureSpec(String),

    /// The query key matched no row after feature construction
    #[error("row not found: {0}")]
    RowNotFound(String),

    /// The conversational model could not be reached or refused the request
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The artifact exists but could not be interpreted
    #[error("malformed artifact {}: {reason}", .path.display())]
    Artifact { path: PathBuf, reason: String },

    /// The predictor rejected its input or failed during inference
    #[error("model error: {0}")]
    Model(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl PredictError {
    /// Short stable name used in diagnostics and metric labels
    pub fn kind(&self) -> &'static str {
        match self {
            PredictError::NotFound { .. } => "NotFound",
            PredictError::MissingColumns(_) => "MissingColumns",
            PredictError::InvalidFeatureSpec(_) => "InvalidFeatureSpec",
            PredictError::RowNotFound(_) => "RowNotFound",
            PredictError::UpstreamUnavailable(_) => "UpstreamUnavailable",
            PredictError::Artifact { .. } => "Artifact",
            PredictError::Model(_) => "Model",
            PredictError::Io(_) => "Io",
            PredictError::Csv(_) => "Csv",
        }
    }

    pub fn not_found(what: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        PredictError::NotFound {
            what: what.into(),
            path: path.into(),
        }
    }

    pub fn artifact(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        PredictError::Artifact {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T, E = PredictError> = std::result::Result<T, E>;
