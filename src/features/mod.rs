//! Feature canonicalization module
//!
//! Turns a partial stop/time context into the fixed-order numeric vector
//! consumed by both training and prediction.

mod context;
mod vector;

pub use context::{canonicalize, canonicalize_at, is_peak_hour, FieldValue, RawContext};
pub use vector::{FeatureVector, FEATURE_NAMES, NUM_FEATURES, PEAK_HOURS};
