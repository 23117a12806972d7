//! Error taxonomy for the price pipeline.
//!
//! Every failure carries the [`Stage`] it originated from so callers get a
//! single typed result instead of a raw fault from deep inside a stage.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Pipeline stage that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Record completeness and domain checks.
    Validation,
    /// Reading and deserializing an artifact file.
    ArtifactLoad,
    /// Categorical encoding.
    Encoding,
    /// Column projection.
    Projection,
    /// Model evaluation.
    Inference,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validation => "validation",
            Stage::ArtifactLoad => "artifact load",
            Stage::Encoding => "encoding",
            Stage::Projection => "projection",
            Stage::Inference => "inference",
        };
        f.write_str(name)
    }
}

/// Which of the two artifacts an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Encoder,
    Model,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Encoder => f.write_str("encoder"),
            ArtifactKind::Model => f.write_str("model"),
        }
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{kind} artifact not found at {}", .path.display())]
    ArtifactNotFound { kind: ArtifactKind, path: PathBuf },

    #[error("{kind} artifact at {} is invalid: {reason}", .path.display())]
    ArtifactInvalid {
        kind: ArtifactKind,
        path: PathBuf,
        reason: String,
    },

    #[error("failed to read {kind} artifact at {}: {source}", .path.display())]
    ArtifactIo {
        kind: ArtifactKind,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("schema mismatch during {stage}: {reason}")]
    SchemaMismatch { stage: Stage, reason: String },

    #[error("column '{column}' is missing from the encoded record")]
    MissingColumn { column: String },

    #[error("unseen category '{value}' in column '{column}'")]
    UnseenCategory { column: String, value: String },

    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("prediction failed: {reason}")]
    PredictionError { reason: String },
}

impl PipelineError {
    /// Stage the error originated from.
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::ArtifactNotFound { .. }
            | PipelineError::ArtifactInvalid { .. }
            | PipelineError::ArtifactIo { .. } => Stage::ArtifactLoad,
            PipelineError::SchemaMismatch { stage, .. } => *stage,
            PipelineError::MissingColumn { .. } => Stage::Projection,
            PipelineError::UnseenCategory { .. } => Stage::Encoding,
            PipelineError::InvalidValue { .. } => Stage::Validation,
            PipelineError::PredictionError { .. } => Stage::Inference,
        }
    }

    pub(crate) fn schema(stage: Stage, reason: impl Into<String>) -> Self {
        PipelineError::SchemaMismatch {
            stage,
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_artifact(
        kind: ArtifactKind,
        path: impl Into<PathBuf>,
        reason: impl Into<String>,
    ) -> Self {
        PipelineError::ArtifactInvalid {
            kind,
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn prediction(reason: impl fmt::Display) -> Self {
        PipelineError::PredictionError {
            reason: reason.to_string(),
        }
    }
}
