//! Trainable regressor abstraction and shared hyperparameters

use crate::error::{Error, Result};
use crate::features::NUM_FEATURES;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which passenger count a model predicts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    Boarding,
    Alighting,
}

impl Target {
    pub const ALL: [Target; 2] = [Target::Boarding, Target::Alighting];

    pub fn name(&self) -> &'static str {
        match self {
            Target::Boarding => "boarding",
            Target::Alighting => "alighting",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Hyperparameters shared by the boarding and alighting ensembles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    /// Number of trees in the forest
    pub n_trees: usize,
    /// Maximum depth of each tree
    pub max_depth: usize,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features drawn per split (floor of sqrt of total if None)
    pub max_features: Option<usize>,
    /// Random seed
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 200,
            max_depth: 15,
            min_samples_split: 3,
            min_samples_leaf: 1,
            max_features: None,
            seed: 42,
        }
    }
}

impl ForestConfig {
    /// Features to draw at each split for `n_features` inputs
    pub fn resolved_max_features(&self, n_features: usize) -> usize {
        self.max_features
            .unwrap_or_else(|| (n_features as f64).sqrt().floor() as usize)
            .clamp(1, n_features.max(1))
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_trees == 0 {
            return Err(Error::Config("n_trees must be positive".into()));
        }
        if self.max_depth == 0 {
            return Err(Error::Config("max_depth must be positive".into()));
        }
        if self.min_samples_split < 2 {
            return Err(Error::Config("min_samples_split must be at least 2".into()));
        }
        if self.min_samples_leaf == 0 {
            return Err(Error::Config("min_samples_leaf must be positive".into()));
        }
        if self.max_features == Some(0) {
            return Err(Error::Config("max_features must be positive".into()));
        }
        Ok(())
    }
}

/// A regression model the trainer can fit for one target.
///
/// The trainer only talks to this trait, so the ensemble behind it can be
/// swapped without touching the training pipeline.
pub trait Regressor: Send + Sync + Sized {
    /// Unfitted model for `target` with the shared hyperparameters
    fn for_target(target: Target, config: &ForestConfig) -> Self;

    /// Fit on canonical feature rows and their target values
    fn fit(&mut self, rows: &[[f64; NUM_FEATURES]], targets: &[f64]) -> Result<()>;

    /// Raw prediction for one feature row
    fn predict_one(&self, row: &[f64; NUM_FEATURES]) -> f64;

    /// Importances normalized to sum to 1
    fn feature_importances(&self) -> [f64; NUM_FEATURES];

    fn target(&self) -> Target;

    /// Predict a batch of rows
    fn predict(&self, rows: &[[f64; NUM_FEATURES]]) -> Vec<f64> {
        rows.iter().map(|r| self.predict_one(r)).collect()
    }
}
