//! Fitted regression models behind a single `predict` seam.
//!
//! Two artifact formats are supported, chosen by file extension:
//! - `.onnx`: an exported estimator run through ONNX Runtime
//! - `.json`: a linear model (coefficients in feature order plus intercept)

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::{Value, ValueType};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::artifact::read_with_retry;
use crate::error::{ArtifactKind, PipelineError, Stage};
use crate::features::FeatureRow;
use crate::schema::{first_order_mismatch, FEATURE_COLUMNS, NUM_FEATURES};
use crate::Result;

/// A fitted regressor. Implementations are immutable after loading.
pub trait Regressor: Send + Sync {
    /// One prediction per input row.
    fn predict(&self, features: &FeatureRow) -> Result<Vec<f64>>;

    /// Short label for logs.
    fn describe(&self) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinearKind {
    Linear,
}

/// Serialized linear model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearArtifact {
    pub kind: LinearKind,
    pub feature_names: Vec<String>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

/// Ordinary linear regressor evaluated in `f64`.
#[derive(Debug, Clone)]
pub struct LinearRegressor {
    coefficients: Vec<f64>,
    intercept: f64,
}

impl LinearRegressor {
    pub fn from_artifact(artifact: LinearArtifact, path: &Path) -> Result<Self> {
        if let Some((pos, expected, found)) =
            first_order_mismatch(&FEATURE_COLUMNS, &artifact.feature_names)
        {
            return Err(PipelineError::schema(
                Stage::ArtifactLoad,
                format!("model feature {pos} should be '{expected}', found '{found}'"),
            ));
        }

        if artifact.coefficients.len() != artifact.feature_names.len() {
            return Err(PipelineError::invalid_artifact(
                ArtifactKind::Model,
                path,
                format!(
                    "{} coefficients for {} features",
                    artifact.coefficients.len(),
                    artifact.feature_names.len()
                ),
            ));
        }

        Ok(Self {
            coefficients: artifact.coefficients,
            intercept: artifact.intercept,
        })
    }
}

impl Regressor for LinearRegressor {
    fn predict(&self, features: &FeatureRow) -> Result<Vec<f64>> {
        if features.num_features() != self.coefficients.len() {
            return Err(PipelineError::prediction(format!(
                "model expects {} features, got {}",
                self.coefficients.len(),
                features.num_features()
            )));
        }

        let predictions = features
            .values()
            .rows()
            .into_iter()
            .map(|row| {
                row.iter()
                    .zip(&self.coefficients)
                    .fold(self.intercept, |acc, (x, w)| acc + x * w)
            })
            .collect();

        Ok(predictions)
    }

    fn describe(&self) -> String {
        format!("linear({} features)", self.coefficients.len())
    }
}

/// Regressor exported to ONNX.
///
/// ONNX Runtime needs exclusive access to run a session, so the session sits
/// behind a mutex; everything else about the model is immutable.
pub struct OnnxRegressor {
    session: Mutex<Session>,
}

impl OnnxRegressor {
    pub fn from_memory(bytes: &[u8], path: &Path) -> Result<Self> {
        let session = Session::builder()
            .map_err(|e| invalid_onnx(path, e))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| invalid_onnx(path, e))?
            .with_intra_threads(1) // Single-threaded for determinism
            .map_err(|e| invalid_onnx(path, e))?
            .commit_from_memory(bytes)
            .map_err(|e| invalid_onnx(path, e))?;

        // Reject a fixed input width that cannot hold the feature row
        let width = session
            .inputs
            .first()
            .and_then(|input| match &input.input_type {
                ValueType::Tensor { shape, .. } => shape.last().copied(),
                _ => None,
            });
        if let Some(width) = width {
            if width >= 0 && width as usize != NUM_FEATURES {
                return Err(PipelineError::schema(
                    Stage::ArtifactLoad,
                    format!("ONNX model takes {width} features, expected {NUM_FEATURES}"),
                ));
            }
        }

        Ok(Self {
            session: Mutex::new(session),
        })
    }
}

fn invalid_onnx(path: &Path, err: impl std::fmt::Display) -> PipelineError {
    PipelineError::invalid_artifact(ArtifactKind::Model, path, err.to_string())
}

impl Regressor for OnnxRegressor {
    fn predict(&self, features: &FeatureRow) -> Result<Vec<f64>> {
        let input_tensor =
            Value::from_array(features.to_f32()).map_err(PipelineError::prediction)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| PipelineError::prediction("ONNX session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![input_tensor])
            .map_err(PipelineError::prediction)?;

        let (_, output) = outputs
            .iter()
            .next()
            .ok_or_else(|| PipelineError::prediction("model produced no outputs"))?;

        let (_, data) = output
            .try_extract_tensor::<f32>()
            .map_err(PipelineError::prediction)?;

        Ok(data.iter().map(|&v| f64::from(v)).collect())
    }

    fn describe(&self) -> String {
        "onnx".to_string()
    }
}

/// Load a model artifact, picking the format from the file extension.
///
/// # Arguments
/// * `path` - `.onnx` or `.json` model file
/// * `retries` - Extra read attempts on transient I/O errors
/// * `backoff` - Delay between read attempts
///
/// # Returns
/// The loaded regressor, already checked against the feature order
///
/// # Example
/// ```no_run
/// use carprice_inference::load_model;
/// use std::path::Path;
/// use std::time::Duration;
///
/// let model = load_model(
///     Path::new("car_prediction_model.onnx"),
///     2,
///     Duration::from_millis(50)
/// ).unwrap();
/// ```
pub fn load_model(path: &Path, retries: u32, backoff: Duration) -> Result<Box<dyn Regressor>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    // Unknown formats are rejected before touching the file
    if !matches!(extension.as_deref(), Some("onnx") | Some("json")) {
        if !path.exists() {
            return Err(PipelineError::ArtifactNotFound {
                kind: ArtifactKind::Model,
                path: path.to_path_buf(),
            });
        }
        return Err(PipelineError::invalid_artifact(
            ArtifactKind::Model,
            path,
            "unsupported model format, expected .onnx or .json",
        ));
    }

    let bytes = read_with_retry(ArtifactKind::Model, path, retries, backoff)?;

    let model: Box<dyn Regressor> = match extension.as_deref() {
        Some("json") => {
            let artifact: LinearArtifact = serde_json::from_slice(&bytes).map_err(|e| {
                PipelineError::invalid_artifact(ArtifactKind::Model, path, e.to_string())
            })?;
            Box::new(LinearRegressor::from_artifact(artifact, path)?)
        }
        _ => Box::new(OnnxRegressor::from_memory(&bytes, path)?),
    };

    info!(path = %path.display(), model = %model.describe(), "loaded model artifact");
    Ok(model)
}

/// Predict a single price from a single-row feature matrix.
pub fn predict(features: &FeatureRow, model: &dyn Regressor) -> Result<f64> {
    if features.num_rows() != 1 {
        return Err(PipelineError::prediction(format!(
            "expected exactly one feature row, got {}",
            features.num_rows()
        )));
    }

    let predictions = model.predict(features)?;
    match predictions.as_slice() {
        [price] => Ok(*price),
        other => Err(PipelineError::prediction(format!(
            "expected one prediction, model returned {}",
            other.len()
        ))),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::encoder::tests::sample_encoder;
    use crate::features::project;
    use crate::record::records_to_frame;
    use crate::record::tests::corolla;
    use serde_json::{json, Value as Json};

    /// Distinct weights per feature so any column swap changes the output.
    pub(crate) fn sample_linear_artifact() -> Json {
        json!({
            "kind": "linear",
            "feature_names": FEATURE_COLUMNS,
            "coefficients": [
                -0.8, 0.35, 0.6, 310.0, 0.25, 0.15, 0.1,
                1500.0, -0.02, 0.2, 0.05, 0.12, -40.0
            ],
            "intercept": -620000.0
        })
    }

    pub(crate) fn sample_model() -> LinearRegressor {
        let artifact = serde_json::from_value(sample_linear_artifact()).unwrap();
        LinearRegressor::from_artifact(artifact, Path::new("model.json")).unwrap()
    }

    fn corolla_features() -> FeatureRow {
        let frame = records_to_frame(&[corolla()]).unwrap();
        project(&sample_encoder().transform(&frame).unwrap()).unwrap()
    }

    #[test]
    fn test_linear_predict() {
        let model = sample_model();
        let features = corolla_features();

        let expected = features
            .row(0)
            .iter()
            .zip(sample_linear_artifact()["coefficients"].as_array().unwrap())
            .fold(-620000.0, |acc, (x, w)| acc + x * w.as_f64().unwrap());

        let price = predict(&features, &model).unwrap();
        assert!(price.is_finite());
        assert!((price - expected).abs() < 1e-9);
    }

    #[test]
    fn test_column_swap_changes_prediction() {
        let model = sample_model();
        let frame = records_to_frame(&[corolla()]).unwrap();
        let mut encoded = sample_encoder().transform(&frame).unwrap();
        let baseline = predict(&project(&encoded).unwrap(), &model).unwrap();

        // Manufacturer and Model trade places ahead of projection
        encoded.swap_columns(1, 2);
        let swapped = predict(&project(&encoded).unwrap(), &model).unwrap();

        assert!((baseline - swapped).abs() > 1e-6);
    }

    #[test]
    fn test_linear_artifact_order_checked_at_load() {
        let mut artifact = sample_linear_artifact();
        let names = artifact["feature_names"].as_array_mut().unwrap();
        names.swap(0, 1);
        let artifact = serde_json::from_value(artifact).unwrap();

        let err = LinearRegressor::from_artifact(artifact, Path::new("m.json")).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::SchemaMismatch {
                stage: Stage::ArtifactLoad,
                ..
            }
        ));
    }

    #[test]
    fn test_linear_artifact_coefficient_count() {
        let mut artifact = sample_linear_artifact();
        artifact["coefficients"].as_array_mut().unwrap().pop();
        let artifact = serde_json::from_value(artifact).unwrap();

        let err = LinearRegressor::from_artifact(artifact, Path::new("m.json")).unwrap_err();
        assert!(matches!(err, PipelineError::ArtifactInvalid { .. }));
    }

    #[test]
    fn test_predict_requires_single_row() {
        let model = sample_model();
        let err = predict(&FeatureRow::empty_for_test(2), &model).unwrap_err();
        assert!(matches!(err, PipelineError::PredictionError { .. }));
    }

    #[test]
    fn test_load_model_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let json_path = dir.path().join("model.json");
        std::fs::write(
            &json_path,
            serde_json::to_vec(&sample_linear_artifact()).unwrap(),
        )
        .unwrap();
        let model = load_model(&json_path, 0, Duration::ZERO).unwrap();
        assert_eq!(model.describe(), "linear(13 features)");

        let missing = dir.path().join("car_prediction_model.onnx");
        let err = load_model(&missing, 0, Duration::ZERO).err().unwrap();
        assert!(matches!(err, PipelineError::ArtifactNotFound { .. }));

        let pickle = dir.path().join("model.joblib");
        std::fs::write(&pickle, b"\x80\x04").unwrap();
        let err = load_model(&pickle, 0, Duration::ZERO).err().unwrap();
        assert!(matches!(err, PipelineError::ArtifactInvalid { .. }));
    }

    fn fixture(name: &str) -> std::path::PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures")
            .join(name)
    }

    #[test]
    fn test_onnx_matches_linear_model() {
        // linear_13.onnx is MatMul + Add with the sample linear weights
        let onnx = load_model(&fixture("linear_13.onnx"), 0, Duration::ZERO).unwrap();
        assert_eq!(onnx.describe(), "onnx");

        let features = corolla_features();
        let from_onnx = predict(&features, onnx.as_ref()).unwrap();
        let from_linear = predict(&features, &sample_model()).unwrap();

        // Evaluated in f32 by ONNX Runtime
        let tolerance = 1e-5 * from_linear.abs().max(1.0);
        assert!((from_onnx - from_linear).abs() < tolerance);
    }

    #[test]
    fn test_onnx_one_prediction_per_row() {
        let onnx = load_model(&fixture("linear_13.onnx"), 0, Duration::ZERO).unwrap();

        let predictions = onnx.predict(&FeatureRow::empty_for_test(3)).unwrap();
        assert_eq!(predictions, vec![-620000.0; 3]);
    }

    #[test]
    fn test_onnx_input_width_checked_at_load() {
        let err = load_model(&fixture("linear_12.onnx"), 0, Duration::ZERO)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            PipelineError::SchemaMismatch {
                stage: Stage::ArtifactLoad,
                ..
            }
        ));
    }

    #[test]
    fn test_corrupt_onnx_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.onnx");
        std::fs::write(&path, b"definitely not protobuf").unwrap();

        let err = load_model(&path, 0, Duration::ZERO).err().unwrap();
        assert!(matches!(err, PipelineError::ArtifactInvalid { .. }));
    }
}
