//! Error taxonomy for loading, transforming and predicting.
//!
//! Every failure the service can produce is one of these variants. The
//! gateway maps them onto wire-level categories in [`crate::gateway`].

use std::path::PathBuf;
use thiserror::Error;

/// Failure to load or validate an artifact bundle.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Artifact file could not be read
    #[error("failed to read {artifact} artifact at {}: {source}", path.display())]
    Io {
        artifact: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Artifact file is not valid for its format
    #[error("failed to parse {artifact} artifact at {}: {source}", path.display())]
    Parse {
        artifact: &'static str,
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Artifact parsed but its contents are unusable
    #[error("invalid {artifact} artifact: {reason}")]
    Invalid {
        artifact: &'static str,
        reason: String,
    },

    /// Artifacts disagree with each other or with the feature schema
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),
}

impl LoadError {
    pub(crate) fn invalid(artifact: &'static str, reason: impl Into<String>) -> Self {
        LoadError::Invalid {
            artifact,
            reason: reason.into(),
        }
    }

    pub(crate) fn mismatch(reason: impl Into<String>) -> Self {
        LoadError::SchemaMismatch(reason.into())
    }
}

/// Failure to turn a raw record into a feature vector.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransformError {
    /// Categorical value outside the encoder's closed label set
    #[error("unknown category for {field}: {value}")]
    UnknownCategory { field: String, value: String },

    /// Record lacks a field the schema requires
    #[error("missing field {field}")]
    MissingField { field: String },

    /// Value has the wrong kind for its schema field
    #[error("field {field} must be {expected}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
    },

    /// Produced vector disagrees with the schema length
    #[error("feature vector has {actual} values, schema has {expected}")]
    SchemaMismatch { expected: usize, actual: usize },
}

impl TransformError {
    /// Whether the caller's input caused this error.
    pub fn is_client_fault(&self) -> bool {
        !matches!(self, TransformError::SchemaMismatch { .. })
    }

    /// Schema field the error refers to, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            TransformError::UnknownCategory { field, .. }
            | TransformError::MissingField { field }
            | TransformError::TypeMismatch { field, .. } => Some(field),
            TransformError::SchemaMismatch { .. } => None,
        }
    }
}

/// Failure while evaluating the model.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictError {
    /// Input width does not match the model
    #[error("model expects {expected} features, got {actual}")]
    Dimension { expected: usize, actual: usize },

    /// Model produced NaN or infinity
    #[error("model produced a non-finite output: {0}")]
    NonFinite(f64),
}
