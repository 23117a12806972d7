//! Feature projection for model inputs.
//!
//! Turns an encoded record batch into the dense matrix the model consumes by
//! dropping the columns the model was not trained on.
//!
//! **Critical for correctness**: the projector never reorders. The feature
//! order is whatever order the encoded batch arrived in, which is the record
//! order from [`crate::schema::RECORD_COLUMNS`]. If that order drifts from
//! training, predictions degrade silently; [`check_feature_order`] exists to
//! catch that when enabled.

use ndarray::{Array2, ArrayView1, ArrayView2};
use tracing::debug;

use crate::error::{PipelineError, Stage};
use crate::frame::Frame;
use crate::schema::{first_order_mismatch, DROPPED_COLUMNS, FEATURE_COLUMNS};
use crate::Result;

/// Model-ready numeric rows with their column names.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    names: Vec<String>,
    values: Array2<f64>,
}

impl FeatureRow {
    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn num_rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn num_features(&self) -> usize {
        self.values.ncols()
    }

    /// Full-precision values, shape `(rows, features)`.
    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    pub fn row(&self, index: usize) -> ArrayView1<'_, f64> {
        self.values.row(index)
    }

    /// Single-precision copy for runtimes that take float32 tensors.
    pub fn to_f32(&self) -> Array2<f32> {
        self.values.mapv(|v| v as f32)
    }

    /// Value of a named feature in `row`.
    pub fn get(&self, name: &str, row: usize) -> Option<f64> {
        let col = self.names.iter().position(|n| n == name)?;
        self.values.get((row, col)).copied()
    }

    #[cfg(test)]
    pub(crate) fn empty_for_test(rows: usize) -> Self {
        Self {
            names: FEATURE_COLUMNS.iter().map(|s| s.to_string()).collect(),
            values: Array2::zeros((rows, FEATURE_COLUMNS.len())),
        }
    }
}

/// Drop the unused columns from an encoded batch.
///
/// Fails with `MissingColumn` if any of the dropped columns is absent, since
/// that means the batch does not have the shape the model expects.
pub fn project(encoded: &Frame) -> Result<FeatureRow> {
    for column in DROPPED_COLUMNS {
        if encoded.position(column).is_none() {
            return Err(PipelineError::MissingColumn {
                column: column.to_string(),
            });
        }
    }

    let kept: Vec<_> = encoded
        .columns()
        .iter()
        .filter(|c| !DROPPED_COLUMNS.contains(&c.name.as_str()))
        .collect();

    let num_rows = encoded.num_rows();
    let mut values = Array2::<f64>::zeros((num_rows, kept.len()));
    let mut names = Vec::with_capacity(kept.len());

    for (col, column) in kept.iter().enumerate() {
        let data = column.data.as_numeric().ok_or_else(|| {
            PipelineError::schema(
                Stage::Projection,
                format!("column '{}' was not encoded", column.name),
            )
        })?;

        for (row, &value) in data.iter().enumerate() {
            values[[row, col]] = value;
        }
        names.push(column.name.clone());
    }

    debug!(rows = num_rows, features = names.len(), "projected features");
    Ok(FeatureRow { names, values })
}

/// Verify that projected columns match the training feature order exactly.
pub fn check_feature_order(features: &FeatureRow) -> Result<()> {
    match first_order_mismatch(&FEATURE_COLUMNS, features.column_names()) {
        None => Ok(()),
        Some((pos, expected, found)) => Err(PipelineError::schema(
            Stage::Projection,
            format!("feature {pos} should be '{expected}', found '{found}'"),
        )),
    }
}
