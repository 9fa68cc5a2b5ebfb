//! Training pipeline
//!
//! Splits the dataset, fits one ensemble per target and scores both on the
//! held-out partition. The two ensembles are fitted concurrently and share
//! nothing but read access to the training partition.

use crate::bundle::ModelBundle;
use crate::data::{Dataset, DatasetBuilder, RawRecord};
use crate::error::{Error, Result};
use crate::evaluation::evaluate;
use crate::models::{ForestConfig, RandomForest, Regressor, Target};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

/// Dataset split settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Share of observations held out for evaluation
    pub test_ratio: f64,
    pub split_seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_ratio: 0.2,
            split_seed: 42,
        }
    }
}

/// Fits boarding and alighting ensembles with shared hyperparameters
#[derive(Debug, Clone, Default)]
pub struct Trainer {
    forest: ForestConfig,
    training: TrainingConfig,
}

impl Trainer {
    pub fn new(forest: ForestConfig, training: TrainingConfig) -> Self {
        Self { forest, training }
    }

    pub fn forest_config(&self) -> &ForestConfig {
        &self.forest
    }

    /// Canonicalize raw records and train on them
    pub fn train_records(&self, records: &[RawRecord]) -> Result<ModelBundle> {
        let dataset = DatasetBuilder::new().build(records)?;
        self.train(&dataset)
    }

    /// Split, fit both targets and evaluate
    pub fn train(&self, dataset: &Dataset) -> Result<ModelBundle> {
        if dataset.is_empty() {
            return Err(Error::EmptyDataset);
        }
        self.forest.validate()?;

        let split = dataset.random_split(self.training.test_ratio, self.training.split_seed)?;
        info!(
            train = split.train.n_samples(),
            test = split.test.n_samples(),
            "dataset split"
        );

        if split.train.n_samples() < self.forest.min_samples_split {
            return Err(Error::InsufficientData {
                required: self.forest.min_samples_split,
                actual: split.train.n_samples(),
            });
        }

        let start = Instant::now();
        let (boarding, alighting) = rayon::join(
            || self.fit_target::<RandomForest>(Target::Boarding, &split.train),
            || self.fit_target::<RandomForest>(Target::Alighting, &split.train),
        );
        let (boarding, alighting) = (boarding?, alighting?);
        info!(
            n_trees = self.forest.n_trees,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "ensembles fitted"
        );

        let metrics = evaluate(&boarding, &alighting, &split.test)?;
        for target in Target::ALL {
            let m = metrics.for_target(target);
            info!(
                model = %target,
                mae = m.mae,
                rmse = m.rmse,
                r2 = m.r2,
                mape = m.mape,
                "held-out evaluation"
            );
        }

        Ok(ModelBundle::new(boarding, alighting, Some(metrics)))
    }

    /// Fit a single target's regressor on the training partition
    pub fn fit_target<R: Regressor>(&self, target: Target, train: &Dataset) -> Result<R> {
        let mut model = R::for_target(target, &self.forest);
        model.fit(&train.feature_rows(), &train.targets(target))?;
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Observation;
    use crate::features::FeatureVector;

    fn observation(i: usize) -> Observation {
        let stop_id = (i % 5) as i64;
        let hour = (6 + i % 12) as i64;
        let peak = crate::features::is_peak_hour(hour);
        Observation {
            features: FeatureVector {
                stop_id,
                hour,
                day_of_week: (i % 7) as i64,
                is_peak_hour: peak,
                current_occupancy: 20,
                stop_sequence: stop_id as f64 / 4.0,
                historical_avg: 4.0 + stop_id as f64,
            },
            boardings: (2 + 2 * stop_id + if peak { 5 } else { 0 }) as u32,
            alightings: (1 + stop_id) as u32,
        }
    }

    fn trainer() -> Trainer {
        Trainer::new(
            ForestConfig {
                n_trees: 10,
                ..Default::default()
            },
            TrainingConfig::default(),
        )
    }

    #[test]
    fn test_train_produces_evaluated_bundle() {
        let dataset = Dataset::from_observations((0..200).map(observation).collect());
        let bundle = trainer().train(&dataset).unwrap();

        assert_eq!(bundle.boarding().n_trees(), 10);
        assert_eq!(bundle.alighting().target(), Target::Alighting);

        let metrics = bundle.metrics().unwrap();
        assert!(metrics.boarding.r2 > 0.8, "r2 = {}", metrics.boarding.r2);
        assert!(metrics.validate().is_ok());
    }

    #[test]
    fn test_empty_dataset() {
        let err = trainer().train(&Dataset::new()).unwrap_err();
        assert!(matches!(err, Error::EmptyDataset));
    }

    #[test]
    fn test_too_few_training_samples() {
        // 3 observations -> 1 test, 2 train < min_samples_split
        let dataset = Dataset::from_observations((0..3).map(observation).collect());
        let err = trainer().train(&dataset).unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientData {
                required: 3,
                actual: 2
            }
        ));
    }
}
