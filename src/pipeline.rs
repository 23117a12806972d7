//! End-to-end price prediction.
//!
//! [`PricePipeline`] owns both artifacts and runs
//! validate → encode → project → predict for one record at a time.
//! Artifacts are resolved from the configured base directory on first use
//! and kept for the lifetime of the pipeline.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::artifact::ArtifactCell;
use crate::config::Config;
use crate::encoder::{encode, TargetEncoder};
use crate::features::{check_feature_order, project};
use crate::frame::Frame;
use crate::model::{load_model, predict, Regressor};
use crate::record::{records_to_frame, Record};
use crate::Result;

/// A predicted price at full precision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub price: f64,
}

impl Prediction {
    /// Price rounded to cents, for display.
    pub fn rounded(&self) -> f64 {
        (self.price * 100.0).round() / 100.0
    }
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.2}", self.price)
    }
}

/// Load-once, read-many prediction pipeline.
///
/// The pipeline is `Sync`; share it behind an `Arc` to serve concurrent
/// callers. Concurrent first calls trigger a single load per artifact.
pub struct PricePipeline {
    config: Config,
    encoder: ArtifactCell<TargetEncoder>,
    model: ArtifactCell<Box<dyn Regressor>>,
}

impl PricePipeline {
    /// Create a pipeline. Artifacts are not read until first use.
    ///
    /// # Arguments
    /// * `config` - Artifact locations and validation options
    ///
    /// # Example
    /// ```no_run
    /// use carprice_inference::{Config, PricePipeline};
    ///
    /// let pipeline = PricePipeline::new(Config::default());
    /// pipeline.warm_up().unwrap();
    /// ```
    pub fn new(config: Config) -> Self {
        Self {
            config,
            encoder: ArtifactCell::new(),
            model: ArtifactCell::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn backoff(&self) -> Duration {
        Duration::from_millis(self.config.artifacts.retry_backoff_ms)
    }

    /// The encoder, loading it on first use.
    pub fn encoder(&self) -> Result<&TargetEncoder> {
        self.encoder.get_or_load(|| {
            let path = self.config.artifacts.encoder_path();
            let encoder =
                TargetEncoder::load(&path, self.config.artifacts.load_retries, self.backoff())?;
            Ok(encoder.with_strict_categories(self.config.validation.strict_categories))
        })
    }

    /// The model, loading it on first use.
    pub fn model(&self) -> Result<&dyn Regressor> {
        let model = self.model.get_or_load(|| {
            let path = self.config.artifacts.model_path();
            load_model(&path, self.config.artifacts.load_retries, self.backoff())
        })?;
        Ok(&**model)
    }

    /// Load both artifacts up front instead of on the first prediction.
    pub fn warm_up(&self) -> Result<()> {
        self.encoder()?;
        self.model()?;
        Ok(())
    }

    /// Number of completed encoder loads (0 or 1).
    pub fn encoder_loads(&self) -> usize {
        self.encoder.load_count()
    }

    /// Number of completed model loads (0 or 1).
    pub fn model_loads(&self) -> usize {
        self.model.load_count()
    }

    /// Validate and encode a record, stopping before projection.
    pub fn encode_record(&self, record: &Record) -> Result<Frame> {
        record.validate(&self.config.validation)?;
        let frame = records_to_frame(std::slice::from_ref(record))?;
        debug!("record validated");
        encode(&frame, self.encoder()?)
    }

    /// Predict the price of one vehicle.
    ///
    /// Loads the encoder and then the model on first use; a failed load is
    /// retried on the next call.
    ///
    /// # Arguments
    /// * `record` - The vehicle, with Doors in display form
    ///
    /// # Returns
    /// The predicted price at full precision, or the first stage error
    ///
    /// # Example
    /// ```no_run
    /// use carprice_inference::{Config, PricePipeline, Record};
    /// use serde_json::json;
    ///
    /// let pipeline = PricePipeline::new(Config::default());
    /// let record = Record::from_json(&json!({
    ///     "Levy": 0, "Manufacturer": "TOYOTA", "Model": "Corolla",
    ///     "Prod. year": 2015, "Category": "Sedan", "Leather interior": "Yes",
    ///     "Fuel type": "Petrol", "Engine volume": 1.6, "Mileage": 80000,
    ///     "Cylinders": 4, "Gear box type": "Automatic", "Drive wheels": "Front",
    ///     "Doors": "4", "Wheel": "Left wheel", "Color": "White", "Airbags": 6
    /// }))
    /// .unwrap();
    ///
    /// let prediction = pipeline.run(&record).unwrap();
    /// println!("The predicted price is: {prediction}");
    /// ```
    pub fn run(&self, record: &Record) -> Result<Prediction> {
        let result = self.run_stages(record);
        match &result {
            Ok(prediction) => info!(
                manufacturer = %record.manufacturer,
                model = %record.model,
                price = prediction.price,
                "predicted price"
            ),
            Err(err) => warn!(stage = %err.stage(), error = %err, "prediction failed"),
        }
        result
    }

    /// Predict from a raw JSON object, checking field completeness first.
    pub fn run_json(&self, value: &Value) -> Result<Prediction> {
        let record = Record::from_json(value).inspect_err(|err| {
            warn!(stage = %err.stage(), error = %err, "record rejected");
        })?;
        self.run(&record)
    }

    fn run_stages(&self, record: &Record) -> Result<Prediction> {
        let encoded = self.encode_record(record)?;

        let features = project(&encoded)?;
        if self.config.validation.strict_column_order {
            check_feature_order(&features)?;
        }

        let price = predict(&features, self.model()?)?;
        Ok(Prediction { price })
    }
}
