//! Pipeline configuration loaded from TOML with environment overrides.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level configuration for the price pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub artifacts: ArtifactConfig,

    #[serde(default)]
    pub validation: ValidationConfig,

    /// Fallback log filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            artifacts: ArtifactConfig::default(),
            validation: ValidationConfig::default(),
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

/// Where the fitted artifacts live and how hard to try reading them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    /// Directory the artifact file names are resolved against
    pub base_dir: PathBuf,

    /// Encoder artifact file name
    pub encoder_file: String,

    /// Model artifact file name (`.onnx` or `.json`)
    pub model_file: String,

    /// Extra attempts after a transient I/O failure (not for missing files)
    pub load_retries: u32,

    /// Pause between attempts in milliseconds
    pub retry_backoff_ms: u64,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            encoder_file: "loo_encoder.json".into(),
            model_file: "car_prediction_model.onnx".into(),
            load_retries: 2,
            retry_backoff_ms: 50,
        }
    }
}

impl ArtifactConfig {
    pub fn encoder_path(&self) -> PathBuf {
        self.base_dir.join(&self.encoder_file)
    }

    pub fn model_path(&self) -> PathBuf {
        self.base_dir.join(&self.model_file)
    }
}

/// Input checks. The two `strict_*` switches are opt-in additions on top of
/// the behaviour the artifacts were trained with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Reject categories the encoder was not fitted on, whatever its policy
    pub strict_categories: bool,

    /// Verify the projected column order against the declared feature order
    pub strict_column_order: bool,

    pub min_prod_year: i32,
    pub max_prod_year: i32,
    pub max_airbags: u32,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            strict_categories: false,
            strict_column_order: false,
            min_prod_year: 1900,
            max_prod_year: 2025,
            max_airbags: 20,
        }
    }
}

impl Config {
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Apply `CARPRICE_*` environment variables on top of the loaded values.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup("CARPRICE_BASE_DIR") {
            self.artifacts.base_dir = PathBuf::from(dir);
        }
        if let Some(file) = lookup("CARPRICE_ENCODER_FILE") {
            self.artifacts.encoder_file = file;
        }
        if let Some(file) = lookup("CARPRICE_MODEL_FILE") {
            self.artifacts.model_file = file;
        }
        if let Some(level) = lookup("CARPRICE_LOG_LEVEL") {
            self.log_level = level;
        }
    }
}
