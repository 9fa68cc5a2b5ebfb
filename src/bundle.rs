//! Trained model bundle

use crate::evaluation::EvaluationMetrics;
use crate::features::FeatureVector;
use crate::models::{RandomForest, Target};

/// Boarding and alighting ensembles with the metrics of their last evaluation.
///
/// Never mutated once built; a retrain produces a whole new bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelBundle {
    boarding: RandomForest,
    alighting: RandomForest,
    metrics: Option<EvaluationMetrics>,
}

impl ModelBundle {
    pub fn new(
        boarding: RandomForest,
        alighting: RandomForest,
        metrics: Option<EvaluationMetrics>,
    ) -> Self {
        Self {
            boarding,
            alighting,
            metrics,
        }
    }

    pub fn model(&self, target: Target) -> &RandomForest {
        match target {
            Target::Boarding => &self.boarding,
            Target::Alighting => &self.alighting,
        }
    }

    pub fn boarding(&self) -> &RandomForest {
        &self.boarding
    }

    pub fn alighting(&self) -> &RandomForest {
        &self.alighting
    }

    pub fn metrics(&self) -> Option<&EvaluationMetrics> {
        self.metrics.as_ref()
    }

    /// Raw (unrounded) prediction of one target's ensemble
    pub fn raw_prediction(&self, target: Target, features: &FeatureVector) -> f64 {
        self.model(target).predict_one(&features.to_array())
    }
}
