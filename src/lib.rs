//! # Transit Demand - Passenger Boarding/Alighting Prediction
//!
//! This library predicts how many passengers will board and alight at a
//! stop of a transit route, using two bagged regression-tree ensembles
//! trained on historical stop observations.
//!
//! ## Modules
//!
//! - `features` - Canonicalization of partial stop/time contexts
//! - `data` - Raw records, training datasets and a synthetic generator
//! - `models` - Regression tree and random forest implementations
//! - `evaluation` - Held-out metrics and feature importance
//! - `trainer` - Split, fit and evaluate pipeline
//! - `predictor` - Rounded predictions with a confidence score
//! - `store` - Atomic bundle persistence
//! - `service` - Serving boundary with a swappable model bundle
//! - `config` - TOML configuration

pub mod bundle;
pub mod config;
pub mod data;
pub mod error;
pub mod evaluation;
pub mod features;
pub mod models;
pub mod predictor;
pub mod service;
pub mod store;
pub mod trainer;

pub use bundle::ModelBundle;
pub use error::{Error, Result};
pub use features::{canonicalize, FeatureVector, RawContext};
pub use models::{RandomForest, Target};
pub use predictor::{PredictionResult, Predictor};
pub use service::DemandService;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::bundle::ModelBundle;
    pub use crate::config::{load_config, EngineConfig};
    pub use crate::data::{Dataset, DatasetBuilder, Observation, RawRecord, Split};
    pub use crate::error::{Error, Result};
    pub use crate::evaluation::{evaluate, EvaluationMetrics, TargetMetrics};
    pub use crate::features::{canonicalize, canonicalize_at, FeatureVector, FieldValue, RawContext};
    pub use crate::models::{ForestConfig, RandomForest, Regressor, Target};
    pub use crate::predictor::{PredictionResult, Predictor};
    pub use crate::service::{DemandService, ModelHandle};
    pub use crate::store::ModelStore;
    pub use crate::trainer::{Trainer, TrainingConfig};
}
