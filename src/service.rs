//! Serving boundary
//!
//! [`DemandService`] is what a transport adapter (HTTP, CLI, tests) talks to.
//! It owns a [`ModelHandle`]: a reference to an immutable [`ModelBundle`] that
//! a retrain or load replaces wholesale. Readers clone the `Arc` and finish
//! against the bundle they started with.

use crate::bundle::ModelBundle;
use crate::config::EngineConfig;
use crate::data::RawRecord;
use crate::error::{Error, Result};
use crate::evaluation::{EvaluationMetrics, ImportancePair};
use crate::features::{canonicalize_at, RawContext};
use crate::predictor::{predict_with, PredictionResult};
use crate::store::ModelStore;
use crate::trainer::Trainer;
use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{info, warn};

const STATUS_SUCCESS: &str = "success";
const STATUS_ERROR: &str = "error";

/// Swappable reference to the live bundle
#[derive(Debug, Default)]
pub struct ModelHandle {
    current: RwLock<Option<Arc<ModelBundle>>>,
}

impl ModelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bundle(bundle: ModelBundle) -> Self {
        Self {
            current: RwLock::new(Some(Arc::new(bundle))),
        }
    }

    /// Snapshot of the live bundle, if any
    pub fn current(&self) -> Option<Arc<ModelBundle>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Install `bundle`, returning the one it replaced
    pub fn swap(&self, bundle: impl Into<Arc<ModelBundle>>) -> Option<Arc<ModelBundle>> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        guard.replace(bundle.into())
    }

    pub fn is_loaded(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

/// Echo of the canonicalized fields a prediction was made for
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PredictionContext {
    pub stop_id: i64,
    pub hour: i64,
    pub is_peak_hour: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictResponse {
    pub status: &'static str,
    pub prediction: PredictionResult,
    pub context: PredictionContext,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsResponse {
    pub status: &'static str,
    pub metrics: EvaluationMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureImportanceResponse {
    pub status: &'static str,
    pub features: BTreeMap<String, ImportancePair>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_loaded: bool,
    /// RFC 3339 local time
    pub timestamp: String,
}

/// Failure envelope; `code` is not serialized, the transport uses it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub kind: &'static str,
    pub message: String,
    #[serde(skip)]
    pub code: u16,
}

impl From<&Error> for ErrorResponse {
    fn from(err: &Error) -> Self {
        Self {
            status: STATUS_ERROR,
            kind: err.kind(),
            message: err.to_string(),
            code: err.status_code(),
        }
    }
}

/// Prediction engine behind a transport
#[derive(Debug)]
pub struct DemandService {
    handle: ModelHandle,
    trainer: Trainer,
    store: ModelStore,
}

impl DemandService {
    pub fn new(trainer: Trainer, store: ModelStore) -> Self {
        Self {
            handle: ModelHandle::new(),
            trainer,
            store,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            Trainer::new(config.forest.clone(), config.training.clone()),
            ModelStore::new(&config.store.model_dir),
        )
    }

    pub fn handle(&self) -> &ModelHandle {
        &self.handle
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    /// Predict for a context, defaulting absent fields from the local clock
    pub fn predict(&self, ctx: &RawContext) -> Result<PredictResponse> {
        self.predict_at(ctx, Local::now().naive_local())
    }

    pub fn predict_at(&self, ctx: &RawContext, now: NaiveDateTime) -> Result<PredictResponse> {
        let bundle = self.handle.current().ok_or(Error::ModelNotLoaded)?;
        let features = canonicalize_at(ctx, now)?;
        let prediction = predict_with(&bundle, &features);

        Ok(PredictResponse {
            status: STATUS_SUCCESS,
            prediction,
            context: PredictionContext {
                stop_id: features.stop_id,
                hour: features.hour,
                is_peak_hour: features.is_peak_hour,
            },
        })
    }

    pub fn metrics(&self) -> Result<MetricsResponse> {
        let metrics = self.loaded_metrics()?;
        Ok(MetricsResponse {
            status: STATUS_SUCCESS,
            metrics,
        })
    }

    pub fn feature_importance(&self) -> Result<FeatureImportanceResponse> {
        let metrics = self.loaded_metrics()?;
        Ok(FeatureImportanceResponse {
            status: STATUS_SUCCESS,
            features: metrics.feature_importance,
        })
    }

    pub fn health(&self) -> HealthResponse {
        HealthResponse {
            status: "healthy",
            model_loaded: self.handle.is_loaded(),
            timestamp: Local::now().to_rfc3339(),
        }
    }

    /// Train a fresh bundle and swap it in. The live bundle keeps serving
    /// until the new one is complete; on failure it stays in place.
    pub fn retrain(&self, records: &[RawRecord]) -> Result<Arc<ModelBundle>> {
        let bundle = Arc::new(self.trainer.train_records(records)?);
        self.handle.swap(Arc::clone(&bundle));
        info!(records = records.len(), "retrained bundle installed");
        Ok(bundle)
    }

    /// Retrain and persist the result to the store
    pub fn retrain_and_save(&self, records: &[RawRecord]) -> Result<Arc<ModelBundle>> {
        let bundle = Arc::new(self.trainer.train_records(records)?);
        self.store.save(&bundle)?;
        self.handle.swap(Arc::clone(&bundle));
        Ok(bundle)
    }

    /// Replace the live bundle with the one in the store
    pub fn load(&self) -> Result<()> {
        let bundle = self.store.load()?;
        self.handle.swap(bundle);
        Ok(())
    }

    /// Load from the store if possible, otherwise keep serving not-loaded
    pub fn try_load(&self) -> bool {
        match self.load() {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "no usable model bundle, train first");
                false
            }
        }
    }

    /// Persist the live bundle
    pub fn save(&self) -> Result<()> {
        let bundle = self.handle.current().ok_or(Error::ModelNotLoaded)?;
        self.store.save(&bundle)
    }

    fn loaded_metrics(&self) -> Result<EvaluationMetrics> {
        let bundle = self.handle.current().ok_or(Error::ModelNotLoaded)?;
        bundle.metrics().cloned().ok_or(Error::MetricsUnavailable)
    }
}
