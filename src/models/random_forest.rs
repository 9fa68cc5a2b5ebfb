//! Random Forest implementation

use super::decision_tree::{DecisionTree, TreeConfig};
use super::regressor::{ForestConfig, Regressor, Target};
use crate::data::bootstrap_indices;
use crate::error::{Error, Result};
use crate::features::NUM_FEATURES;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Bagged ensemble of regression trees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    target: Target,
    config: ForestConfig,
    n_features: usize,
    trees: Vec<DecisionTree>,
    /// Per-feature squared-error reduction summed over all trees
    importances: [f64; NUM_FEATURES],
}

impl RandomForest {
    /// Create a new random forest
    pub fn new(target: Target, config: ForestConfig) -> Self {
        Self {
            target,
            config,
            n_features: NUM_FEATURES,
            trees: Vec::new(),
            importances: [0.0; NUM_FEATURES],
        }
    }

    /// Train the random forest.
    ///
    /// Tree `i` is seeded with `seed + i`, so the fitted forest does not depend
    /// on thread scheduling. The bootstrap sample and the split features are
    /// drawn from separate ChaCha streams of that seed.
    pub fn fit(&mut self, rows: &[[f64; NUM_FEATURES]], targets: &[f64]) -> Result<()> {
        self.config.validate()?;

        if rows.len() != targets.len() {
            return Err(Error::Schema(format!(
                "{} feature rows but {} targets",
                rows.len(),
                targets.len()
            )));
        }
        if rows.len() < self.config.min_samples_split {
            return Err(Error::InsufficientData {
                required: self.config.min_samples_split,
                actual: rows.len(),
            });
        }

        let n_samples = rows.len();
        let max_features = self.config.resolved_max_features(NUM_FEATURES);

        debug!(
            model = %self.target,
            n_trees = self.config.n_trees,
            n_samples,
            max_features,
            "fitting forest"
        );

        // Build trees in parallel
        let trees: Vec<DecisionTree> = (0..self.config.n_trees)
            .into_par_iter()
            .map(|i| {
                let seed = self.config.seed.wrapping_add(i as u64);
                let mut tree = DecisionTree::new(TreeConfig {
                    max_depth: self.config.max_depth,
                    min_samples_split: self.config.min_samples_split,
                    min_samples_leaf: self.config.min_samples_leaf,
                    max_features,
                    seed,
                });

                let sample = bootstrap_indices(n_samples, seed);
                tree.fit(rows, targets, &sample);
                tree
            })
            .collect();

        let mut importances = [0.0; NUM_FEATURES];
        for tree in &trees {
            for (total, imp) in importances.iter_mut().zip(tree.raw_importances()) {
                *total += imp;
            }
        }

        self.trees = trees;
        self.importances = importances;
        self.n_features = NUM_FEATURES;
        Ok(())
    }

    /// Mean of the trees' predictions; 0 before fitting
    pub fn predict_one(&self, row: &[f64; NUM_FEATURES]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }

        self.trees.iter().map(|t| t.predict_one(row)).sum::<f64>() / self.trees.len() as f64
    }

    /// Predict for multiple samples
    pub fn predict(&self, rows: &[[f64; NUM_FEATURES]]) -> Vec<f64> {
        rows.par_iter().map(|r| self.predict_one(r)).collect()
    }

    /// Feature importances normalized to sum to 1.
    ///
    /// A forest made only of single-leaf trees credits every feature equally.
    pub fn feature_importances(&self) -> [f64; NUM_FEATURES] {
        let sum: f64 = self.importances.iter().sum();
        if sum > 0.0 {
            self.importances.map(|imp| imp / sum)
        } else {
            [1.0 / NUM_FEATURES as f64; NUM_FEATURES]
        }
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Number of trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Structural sanity check for deserialized forests
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.n_features != NUM_FEATURES {
            return Err(format!(
                "model expects {} features, engine provides {}",
                self.n_features, NUM_FEATURES
            ));
        }
        if self.trees.is_empty() {
            return Err("forest has no trees".to_string());
        }
        if self.trees.len() != self.config.n_trees {
            return Err(format!(
                "forest has {} trees, config says {}",
                self.trees.len(),
                self.config.n_trees
            ));
        }
        if self.importances.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err("invalid feature importances".to_string());
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate().map_err(|e| format!("tree {}: {}", i, e))?;
        }
        Ok(())
    }
}

impl Regressor for RandomForest {
    fn for_target(target: Target, config: &ForestConfig) -> Self {
        RandomForest::new(target, config.clone())
    }

    fn fit(&mut self, rows: &[[f64; NUM_FEATURES]], targets: &[f64]) -> Result<()> {
        RandomForest::fit(self, rows, targets)
    }

    fn predict_one(&self, row: &[f64; NUM_FEATURES]) -> f64 {
        RandomForest::predict_one(self, row)
    }

    fn feature_importances(&self) -> [f64; NUM_FEATURES] {
        RandomForest::feature_importances(self)
    }

    fn target(&self) -> Target {
        self.target
    }

    fn predict(&self, rows: &[[f64; NUM_FEATURES]]) -> Vec<f64> {
        RandomForest::predict(self, rows)
    }
}
