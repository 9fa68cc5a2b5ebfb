//! Held-out evaluation and feature importance
//!
//! Regression metrics follow the usual definitions except MAPE, which divides
//! by `actual + 1` so that stops with zero observed passengers stay defined.

use crate::data::Dataset;
use crate::error::{Error, Result};
use crate::features::{FEATURE_NAMES, NUM_FEATURES};
use crate::models::{Regressor, Target};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Accuracy of one target's model on the test partition
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetMetrics {
    pub mae: f64,
    pub rmse: f64,
    pub r2: f64,
    /// Percentage error smoothed with a +1 denominator
    pub mape: f64,
}

impl TargetMetrics {
    pub fn compute(actual: &Array1<f64>, predicted: &Array1<f64>) -> Self {
        assert_eq!(actual.len(), predicted.len(), "Arrays must have same length");
        let n = actual.len() as f64;

        let residuals = actual - predicted;
        let mae = residuals.mapv(f64::abs).sum() / n;
        let ss_res = residuals.mapv(|r| r * r).sum();
        let rmse = (ss_res / n).sqrt();

        let mean = actual.sum() / n;
        let ss_tot = actual.mapv(|a| (a - mean).powi(2)).sum();
        let r2 = if ss_tot == 0.0 { 0.0 } else { 1.0 - ss_res / ss_tot };

        let mape = residuals
            .iter()
            .zip(actual.iter())
            .map(|(r, a)| r.abs() / (a + 1.0))
            .sum::<f64>()
            / n
            * 100.0;

        Self { mae, rmse, r2, mape }
    }
}

/// Importance of one feature in each ensemble
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImportancePair {
    pub boarding: f64,
    pub alighting: f64,
}

impl ImportancePair {
    pub fn get(&self, target: Target) -> f64 {
        match target {
            Target::Boarding => self.boarding,
            Target::Alighting => self.alighting,
        }
    }
}

/// Metrics document stored alongside a trained bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub boarding: TargetMetrics,
    pub alighting: TargetMetrics,
    pub feature_importance: BTreeMap<String, ImportancePair>,
}

impl EvaluationMetrics {
    pub fn for_target(&self, target: Target) -> &TargetMetrics {
        match target {
            Target::Boarding => &self.boarding,
            Target::Alighting => &self.alighting,
        }
    }

    /// Features sorted by importance for `target`, highest first
    pub fn ranked(&self, target: Target) -> Vec<(&str, f64)> {
        let mut ranking: Vec<(&str, f64)> = self
            .feature_importance
            .iter()
            .map(|(name, pair)| (name.as_str(), pair.get(target)))
            .collect();

        ranking.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranking
    }

    /// Structural sanity check for deserialized metrics
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.feature_importance.len() != NUM_FEATURES {
            return Err(format!(
                "expected importance for {} features, found {}",
                NUM_FEATURES,
                self.feature_importance.len()
            ));
        }
        for name in FEATURE_NAMES {
            if !self.feature_importance.contains_key(name) {
                return Err(format!("missing importance for `{}`", name));
            }
        }

        for target in Target::ALL {
            let m = self.for_target(target);
            if [m.mae, m.rmse, m.r2, m.mape].iter().any(|v| !v.is_finite()) {
                return Err(format!("non-finite {} metrics", target));
            }

            let values: Vec<f64> = self
                .feature_importance
                .values()
                .map(|p| p.get(target))
                .collect();
            if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
                return Err(format!("invalid {} importance", target));
            }
            let sum: f64 = values.iter().sum();
            if (sum - 1.0).abs() > 1e-6 {
                return Err(format!("{} importances sum to {}", target, sum));
            }
        }
        Ok(())
    }
}

/// Score both models on the held-out partition
pub fn evaluate<R: Regressor>(boarding: &R, alighting: &R, test: &Dataset) -> Result<EvaluationMetrics> {
    if test.is_empty() {
        return Err(Error::InsufficientData {
            required: 1,
            actual: 0,
        });
    }

    let rows = test.feature_rows();
    let score = |model: &R| {
        let actual = Array1::from_vec(test.targets(model.target()));
        let predicted = Array1::from_vec(model.predict(&rows));
        TargetMetrics::compute(&actual, &predicted)
    };

    let importance_b = boarding.feature_importances();
    let importance_a = alighting.feature_importances();

    let feature_importance = FEATURE_NAMES
        .iter()
        .enumerate()
        .map(|(i, name)| {
            (
                name.to_string(),
                ImportancePair {
                    boarding: importance_b[i],
                    alighting: importance_a[i],
                },
            )
        })
        .collect();

    Ok(EvaluationMetrics {
        boarding: score(boarding),
        alighting: score(alighting),
        feature_importance,
    })
}
