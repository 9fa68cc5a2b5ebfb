//! Canonical feature vector

use serde::{Deserialize, Serialize};

/// Number of features every model consumes
pub const NUM_FEATURES: usize = 7;

/// Feature names, in the order models are trained and queried with
pub const FEATURE_NAMES: [&str; NUM_FEATURES] = [
    "stop_id",
    "hour",
    "day_of_week",
    "is_peak_hour",
    "current_occupancy",
    "stop_sequence",
    "historical_avg",
];

/// Morning (7-9) and evening (17-19) rush hours
pub const PEAK_HOURS: [i64; 6] = [7, 8, 9, 17, 18, 19];

/// Fully populated feature vector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub stop_id: i64,
    /// Hour of day; not range checked
    pub hour: i64,
    /// Day of week, Monday = 0; not range checked
    pub day_of_week: i64,
    pub is_peak_hour: bool,
    pub current_occupancy: i64,
    /// Relative position along the route, 0.0 (first stop) to 1.0 (last stop)
    pub stop_sequence: f64,
    pub historical_avg: f64,
}

impl FeatureVector {
    /// Numeric representation in `FEATURE_NAMES` order
    pub fn to_array(&self) -> [f64; NUM_FEATURES] {
        [
            self.stop_id as f64,
            self.hour as f64,
            self.day_of_week as f64,
            if self.is_peak_hour { 1.0 } else { 0.0 },
            self.current_occupancy as f64,
            self.stop_sequence,
            self.historical_avg,
        ]
    }
}
