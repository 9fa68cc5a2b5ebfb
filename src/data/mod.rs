//! Data structures and preprocessing module
//!
//! Raw training records, the canonical training dataset and a synthetic
//! record generator.

mod dataset;
mod records;
pub mod synthetic;

pub use dataset::{bootstrap_indices, Dataset, DatasetBuilder, Observation, Split};
pub use records::{load_records_csv, read_records, save_records_csv, write_records, RawRecord};
