//! Used-car price inference.
//!
//! This crate turns a human-entered vehicle record into the exact feature row
//! a previously trained regressor expects, then runs that regressor.
//! Encoding and column layout must match training exactly; see [`schema`].

pub mod artifact;
pub mod config;
pub mod encoder;
pub mod error;
pub mod features;
pub mod frame;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod record;
pub mod schema;

pub use config::{ArtifactConfig, Config, ValidationConfig};
pub use encoder::{encode, TargetEncoder, UnknownPolicy};
pub use error::{ArtifactKind, PipelineError, Stage};
pub use features::{project, FeatureRow};
pub use frame::Frame;
pub use model::{load_model, predict, Regressor};
pub use pipeline::{Prediction, PricePipeline};
pub use record::{Doors, Record};

/// Library-wide result type.
pub type Result<T> = std::result::Result<T, PipelineError>;
