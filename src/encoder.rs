//! Categorical encoding with a fitted leave-one-out target encoder.
//!
//! The encoder artifact is exported by the training job as JSON. For every
//! categorical column it stores the per-category target sum and row count
//! seen during fitting. Without a target, the fitted encoder returns
//! `sum / count` for a category seen more than once and the global mean for
//! a category seen at most once, since leaving its only row out leaves
//! nothing to average. Values are recomputed from the stored statistics in
//! `f64`, never approximated.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::artifact::read_with_retry;
use crate::error::{ArtifactKind, PipelineError, Stage};
use crate::frame::{ColumnData, Frame};
use crate::schema::CATEGORICAL_COLUMNS;
use crate::Result;

/// What the fitted encoder does with a category it never saw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownPolicy {
    /// Substitute the global target mean
    #[default]
    Value,
    /// Fail the transform
    Error,
    /// Substitute NaN and let the model deal with it
    ReturnNan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncoderKind {
    LeaveOneOut,
}

/// Target statistics of one category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub sum: f64,
    pub count: u64,
}

/// Serialized form of a fitted encoder, as written by training.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderArtifact {
    pub kind: EncoderKind,
    pub columns: Vec<String>,
    pub global_mean: f64,
    #[serde(default)]
    pub handle_unknown: UnknownPolicy,
    pub mapping: HashMap<String, HashMap<String, CategoryStats>>,
}

/// Encoding table of one categorical column.
#[derive(Debug, Clone)]
struct ColumnTable {
    name: String,
    values: HashMap<String, f64>,
}

/// A loaded, read-only target encoder.
#[derive(Debug, Clone)]
pub struct TargetEncoder {
    tables: Vec<ColumnTable>,
    global_mean: f64,
    handle_unknown: UnknownPolicy,
    strict_categories: bool,
}

impl TargetEncoder {
    /// Build an encoder from its artifact, checking the artifact's column set
    /// against the declared categorical columns.
    pub fn from_artifact(artifact: EncoderArtifact, path: &Path) -> Result<Self> {
        let declared: HashSet<&str> = CATEGORICAL_COLUMNS.iter().copied().collect();
        let fitted: HashSet<&str> = artifact.columns.iter().map(String::as_str).collect();

        if fitted.len() != artifact.columns.len() {
            return Err(PipelineError::invalid_artifact(
                ArtifactKind::Encoder,
                path,
                "duplicate entries in columns",
            ));
        }

        if declared != fitted {
            let mut missing: Vec<&str> = declared.difference(&fitted).copied().collect();
            let mut extra: Vec<&str> = fitted.difference(&declared).copied().collect();
            missing.sort_unstable();
            extra.sort_unstable();
            return Err(PipelineError::schema(
                Stage::ArtifactLoad,
                format!(
                    "encoder columns differ from categorical columns (missing: [{}], extra: [{}])",
                    missing.join(", "),
                    extra.join(", ")
                ),
            ));
        }

        if !artifact.global_mean.is_finite() {
            return Err(PipelineError::invalid_artifact(
                ArtifactKind::Encoder,
                path,
                "global_mean must be finite",
            ));
        }

        let mut mapping = artifact.mapping;
        let mut tables = Vec::with_capacity(artifact.columns.len());
        for name in artifact.columns {
            let stats = mapping.remove(&name).ok_or_else(|| {
                PipelineError::invalid_artifact(
                    ArtifactKind::Encoder,
                    path,
                    format!("no mapping for column '{name}'"),
                )
            })?;

            let values = stats
                .into_iter()
                .map(|(category, s)| {
                    // A singleton has no other rows to average over
                    let value = if s.count <= 1 {
                        artifact.global_mean
                    } else {
                        s.sum / s.count as f64
                    };
                    (category, value)
                })
                .collect();

            tables.push(ColumnTable { name, values });
        }

        Ok(Self {
            tables,
            global_mean: artifact.global_mean,
            handle_unknown: artifact.handle_unknown,
            strict_categories: false,
        })
    }

    pub fn from_slice(bytes: &[u8], path: &Path) -> Result<Self> {
        let artifact: EncoderArtifact = serde_json::from_slice(bytes).map_err(|e| {
            PipelineError::invalid_artifact(ArtifactKind::Encoder, path, e.to_string())
        })?;
        Self::from_artifact(artifact, path)
    }

    /// Read and parse an encoder artifact file.
    pub fn load(path: &Path, retries: u32, backoff: Duration) -> Result<Self> {
        let bytes = read_with_retry(ArtifactKind::Encoder, path, retries, backoff)?;
        let encoder = Self::from_slice(&bytes, path)?;
        info!(
            path = %path.display(),
            columns = encoder.tables.len(),
            policy = ?encoder.handle_unknown,
            "loaded encoder artifact"
        );
        Ok(encoder)
    }

    /// Reject unseen categories regardless of the artifact's own policy.
    pub fn with_strict_categories(mut self, strict: bool) -> Self {
        self.strict_categories = strict;
        self
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|t| t.name.as_str())
    }

    pub fn global_mean(&self) -> f64 {
        self.global_mean
    }

    pub fn handle_unknown(&self) -> UnknownPolicy {
        self.handle_unknown
    }

    /// Learned value of a known category.
    pub fn value_for(&self, column: &str, category: &str) -> Option<f64> {
        self.tables
            .iter()
            .find(|t| t.name == column)?
            .values
            .get(category)
            .copied()
    }

    fn encode_value(&self, table: &ColumnTable, category: &str) -> Result<f64> {
        if let Some(&value) = table.values.get(category) {
            return Ok(value);
        }

        let unseen = || PipelineError::UnseenCategory {
            column: table.name.clone(),
            value: category.to_string(),
        };

        if self.strict_categories {
            return Err(unseen());
        }

        match self.handle_unknown {
            UnknownPolicy::Value => Ok(self.global_mean),
            UnknownPolicy::Error => Err(unseen()),
            UnknownPolicy::ReturnNan => Ok(f64::NAN),
        }
    }

    /// Replace every categorical column of `frame` with its encoded values.
    ///
    /// Numeric columns and column order are left untouched.
    pub fn transform(&self, frame: &Frame) -> Result<Frame> {
        let mut encoded = frame.clone();

        for table in &self.tables {
            let idx = frame.position(&table.name).ok_or_else(|| {
                PipelineError::schema(
                    Stage::Encoding,
                    format!("categorical column '{}' is missing", table.name),
                )
            })?;

            let categories = frame.columns()[idx].data.as_text().ok_or_else(|| {
                PipelineError::schema(
                    Stage::Encoding,
                    format!("column '{}' is not categorical text", table.name),
                )
            })?;

            let values = categories
                .iter()
                .map(|category| self.encode_value(table, category))
                .collect::<Result<Vec<f64>>>()?;

            encoded.replace_data(idx, ColumnData::Numeric(values));
        }

        debug!(rows = frame.num_rows(), "encoded categorical columns");
        Ok(encoded)
    }
}

/// Apply `encoder` to the categorical columns of `batch`.
pub fn encode(batch: &Frame, encoder: &TargetEncoder) -> Result<Frame> {
    encoder.transform(batch)
}
