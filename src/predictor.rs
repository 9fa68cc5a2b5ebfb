//! Point predictions with a confidence score
//!
//! The confidence attached to a prediction is the held-out R² of the model
//! that produced it, scaled to 0-100. It is the same for every input until
//! the next retrain; it is not a per-input uncertainty.

use crate::bundle::ModelBundle;
use crate::error::{Error, Result};
use crate::features::FeatureVector;
use crate::models::Target;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Confidence reported when the bundle carries no evaluation metrics
pub const DEFAULT_CONFIDENCE: u8 = 85;

/// Expected passenger movements at one stop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub expected_boarding: u32,
    pub expected_alighting: u32,
    pub confidence_boarding: u8,
    pub confidence_alighting: u8,
}

/// Round to the nearest whole passenger, never below zero.
///
/// Exact halves go to the even neighbour, so a mean of 2.5 is 2.
pub fn to_count(raw: f64) -> u32 {
    if raw.is_nan() {
        return 0;
    }
    raw.round_ties_even().clamp(0.0, u32::MAX as f64) as u32
}

/// Confidence for `target` from the bundle's last evaluation
pub fn confidence(bundle: &ModelBundle, target: Target) -> u8 {
    match bundle.metrics() {
        Some(metrics) => {
            let r2 = metrics.for_target(target).r2;
            (r2 * 100.0).round().clamp(0.0, 100.0) as u8
        }
        None => DEFAULT_CONFIDENCE,
    }
}

/// Serves predictions from an optional, immutable bundle
#[derive(Debug, Clone, Default)]
pub struct Predictor {
    bundle: Option<Arc<ModelBundle>>,
}

impl Predictor {
    pub fn new(bundle: Arc<ModelBundle>) -> Self {
        Self {
            bundle: Some(bundle),
        }
    }

    /// Predictor with nothing loaded; every prediction fails
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn bundle(&self) -> Option<&Arc<ModelBundle>> {
        self.bundle.as_ref()
    }

    pub fn predict(&self, features: &FeatureVector) -> Result<PredictionResult> {
        let bundle = self.bundle.as_ref().ok_or(Error::ModelNotLoaded)?;
        Ok(predict_with(bundle, features))
    }
}

/// Run both ensembles on one feature vector
pub fn predict_with(bundle: &ModelBundle, features: &FeatureVector) -> PredictionResult {
    let boarding = bundle.raw_prediction(Target::Boarding, features);
    let alighting = bundle.raw_prediction(Target::Alighting, features);
    debug!(boarding, alighting, "raw prediction");

    PredictionResult {
        expected_boarding: to_count(boarding),
        expected_alighting: to_count(alighting),
        confidence_boarding: confidence(bundle, Target::Boarding),
        confidence_alighting: confidence(bundle, Target::Alighting),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_count() {
        assert_eq!(to_count(4.4), 4);
        assert_eq!(to_count(4.6), 5);
        assert_eq!(to_count(4.5), 4);
        assert_eq!(to_count(2.5), 2);
        assert_eq!(to_count(3.5), 4);
        assert_eq!(to_count(-3.2), 0);
        assert_eq!(to_count(-0.4), 0);
        assert_eq!(to_count(f64::NAN), 0);
    }

    #[test]
    fn test_empty_predictor() {
        let features = FeatureVector {
            stop_id: 1,
            hour: 8,
            day_of_week: 0,
            is_peak_hour: true,
            current_occupancy: 20,
            stop_sequence: 0.5,
            historical_avg: 5.0,
        };
        let err = Predictor::empty().predict(&features).unwrap_err();
        assert!(matches!(err, Error::ModelNotLoaded));
    }
}
