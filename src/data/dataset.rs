//! Training dataset and deterministic splitting

use super::records::RawRecord;
use crate::error::{Error, Result};
use crate::features::{canonicalize_at, FeatureVector, NUM_FEATURES};
use crate::models::Target;
use chrono::{Local, NaiveDateTime};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// A canonical feature vector with its observed counts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub features: FeatureVector,
    pub boardings: u32,
    pub alightings: u32,
}

impl Observation {
    /// Observed count for `target`
    pub fn target(&self, target: Target) -> f64 {
        match target {
            Target::Boarding => self.boardings as f64,
            Target::Alighting => self.alightings as f64,
        }
    }
}

/// Ordered collection of observations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    observations: Vec<Observation>,
}

/// Train/test split result
#[derive(Debug, Clone)]
pub struct Split {
    pub train: Dataset,
    pub test: Dataset,
}

impl Dataset {
    /// Create a new empty dataset
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_observations(observations: Vec<Observation>) -> Self {
        Self { observations }
    }

    /// Add an observation
    pub fn push(&mut self, observation: Observation) {
        self.observations.push(observation);
    }

    /// Number of samples
    pub fn n_samples(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Feature rows in canonical order
    pub fn feature_rows(&self) -> Vec<[f64; NUM_FEATURES]> {
        self.observations
            .iter()
            .map(|o| o.features.to_array())
            .collect()
    }

    /// Target column
    pub fn targets(&self, target: Target) -> Vec<f64> {
        self.observations.iter().map(|o| o.target(target)).collect()
    }

    /// Create a subset of the dataset by indices
    pub fn subset(&self, indices: &[usize]) -> Dataset {
        Dataset {
            observations: indices.iter().map(|&i| self.observations[i]).collect(),
        }
    }

    /// Seeded shuffle split.
    ///
    /// The test partition holds `ceil(test_ratio * n)` samples; the same data
    /// and seed always give the same partition.
    pub fn random_split(&self, test_ratio: f64, seed: u64) -> Result<Split> {
        if !(0.0..1.0).contains(&test_ratio) {
            return Err(Error::Config(format!(
                "test ratio must be in [0, 1), got {}",
                test_ratio
            )));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let n = self.n_samples();

        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(&mut rng);

        let test_size = ((test_ratio * n as f64).ceil() as usize).min(n);
        let (test_indices, train_indices) = indices.split_at(test_size);

        Ok(Split {
            train: self.subset(train_indices),
            test: self.subset(test_indices),
        })
    }
}

/// Bootstrap sample indices (draws with replacement, same size as source)
pub fn bootstrap_indices(n: usize, seed: u64) -> Vec<usize> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n).map(|_| rng.gen_range(0..n)).collect()
}

/// Canonicalizes raw records into a [`Dataset`]
#[derive(Debug, Clone)]
pub struct DatasetBuilder {
    reference_time: NaiveDateTime,
}

impl Default for DatasetBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasetBuilder {
    /// Builder whose time defaults come from the local clock
    pub fn new() -> Self {
        Self {
            reference_time: Local::now().naive_local(),
        }
    }

    /// Fix the clock used for missing `hour` / `day_of_week`
    pub fn with_reference_time(mut self, reference_time: NaiveDateTime) -> Self {
        self.reference_time = reference_time;
        self
    }

    pub fn build(&self, records: &[RawRecord]) -> Result<Dataset> {
        if records.is_empty() {
            return Err(Error::EmptyDataset);
        }

        let mut dataset = Dataset::new();
        for (row, record) in records.iter().enumerate() {
            let (boardings, alightings) = record
                .targets()
                .map_err(|e| Error::Schema(format!("record {}: {}", row + 1, e)))?;
            let features = canonicalize_at(&record.context(), self.reference_time)
                .map_err(|e| Error::Schema(format!("record {}: {}", row + 1, e)))?;

            dataset.push(Observation {
                features,
                boardings,
                alightings,
            });
        }

        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FieldValue;

    fn record(stop_id: i64, boardings: u32, alightings: u32) -> RawRecord {
        RawRecord {
            stop_id: Some(FieldValue::Int(stop_id)),
            hour: Some(FieldValue::Int(8)),
            day_of_week: Some(FieldValue::Int(1)),
            boardings: Some(FieldValue::Int(boardings as i64)),
            alightings: Some(FieldValue::Int(alightings as i64)),
            ..Default::default()
        }
    }

    fn dataset(n: usize) -> Dataset {
        let records: Vec<RawRecord> = (0..n).map(|i| record(i as i64, i as u32, 1)).collect();
        DatasetBuilder::new().build(&records).unwrap()
    }

    #[test]
    fn test_build_dataset() {
        let ds = dataset(5);
        assert_eq!(ds.n_samples(), 5);
        assert_eq!(ds.targets(Target::Boarding), vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(ds.targets(Target::Alighting), vec![1.0; 5]);

        let first = ds.observations()[0].features;
        assert!(first.is_peak_hour);
        assert_eq!(first.current_occupancy, 20);
    }

    #[test]
    fn test_empty_input() {
        let err = DatasetBuilder::new().build(&[]).unwrap_err();
        assert!(matches!(err, Error::EmptyDataset));
    }

    #[test]
    fn test_missing_target() {
        let mut bad = record(1, 2, 3);
        bad.alightings = None;
        let err = DatasetBuilder::new()
            .build(&[record(0, 1, 1), bad])
            .unwrap_err();

        assert!(matches!(err, Error::Schema(ref msg) if msg.contains("alightings")));
    }

    #[test]
    fn test_split_sizes_and_determinism() {
        let ds = dataset(101);

        let a = ds.random_split(0.2, 42).unwrap();
        let b = ds.random_split(0.2, 42).unwrap();
        let c = ds.random_split(0.2, 7).unwrap();

        assert_eq!(a.test.n_samples(), 21);
        assert_eq!(a.train.n_samples(), 80);
        assert_eq!(a.train, b.train);
        assert_eq!(a.test, b.test);
        assert_ne!(a.test, c.test);
    }

    #[test]
    fn test_split_is_a_partition() {
        let ds = dataset(50);
        let split = ds.random_split(0.2, 42).unwrap();

        let mut ids: Vec<i64> = split
            .train
            .observations()
            .iter()
            .chain(split.test.observations())
            .map(|o| o.features.stop_id)
            .collect();
        ids.sort();
        assert_eq!(ids, (0..50).collect::<Vec<i64>>());
    }

    #[test]
    fn test_bootstrap_indices() {
        let a = bootstrap_indices(100, 3);
        assert_eq!(a.len(), 100);
        assert!(a.iter().all(|&i| i < 100));
        assert_eq!(a, bootstrap_indices(100, 3));
    }
}
