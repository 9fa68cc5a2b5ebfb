//! Raw context parsing and defaulting

use super::vector::{FeatureVector, PEAK_HOURS};
use crate::error::{Error, Result};
use chrono::{Datelike, Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

const DEFAULT_STOP_ID: i64 = 0;
const DEFAULT_OCCUPANCY: i64 = 20;
const DEFAULT_STOP_SEQUENCE: f64 = 0.5;
const DEFAULT_HISTORICAL_AVG: f64 = 5.0;

/// A loosely typed field value as it arrives from JSON or CSV
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    /// Coerce to a real number
    pub fn as_f64(&self, field: &'static str) -> Result<f64> {
        let value = match self {
            FieldValue::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            FieldValue::Int(i) => *i as f64,
            FieldValue::Float(f) => *f,
            FieldValue::Text(s) => {
                let s = s.trim();
                if s.eq_ignore_ascii_case("true") {
                    1.0
                } else if s.eq_ignore_ascii_case("false") {
                    0.0
                } else {
                    s.parse::<f64>().map_err(|_| self.malformed(field))?
                }
            }
        };

        if value.is_finite() {
            Ok(value)
        } else {
            Err(self.malformed(field))
        }
    }

    /// Coerce to an integer, truncating any fractional part
    pub fn as_i64(&self, field: &'static str) -> Result<i64> {
        match self {
            FieldValue::Int(i) => Ok(*i),
            _ => Ok(self.as_f64(field)?.trunc() as i64),
        }
    }

    /// Coerce to a flag; any non-zero number is true
    pub fn as_flag(&self, field: &'static str) -> Result<bool> {
        match self {
            FieldValue::Bool(b) => Ok(*b),
            _ => Ok(self.as_f64(field)? != 0.0),
        }
    }

    fn malformed(&self, field: &'static str) -> Error {
        let value = match self {
            FieldValue::Text(s) => format!("{:?}", s),
            FieldValue::Float(f) => f.to_string(),
            FieldValue::Int(i) => i.to_string(),
            FieldValue::Bool(b) => b.to_string(),
        };
        Error::MalformedFeature { field, value }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

/// Prediction context with any subset of the seven features
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawContext {
    pub stop_id: Option<FieldValue>,
    pub hour: Option<FieldValue>,
    pub day_of_week: Option<FieldValue>,
    pub is_peak_hour: Option<FieldValue>,
    pub current_occupancy: Option<FieldValue>,
    pub stop_sequence: Option<FieldValue>,
    pub historical_avg: Option<FieldValue>,
}

impl From<FeatureVector> for RawContext {
    fn from(v: FeatureVector) -> Self {
        Self {
            stop_id: Some(v.stop_id.into()),
            hour: Some(v.hour.into()),
            day_of_week: Some(v.day_of_week.into()),
            is_peak_hour: Some(v.is_peak_hour.into()),
            current_occupancy: Some(v.current_occupancy.into()),
            stop_sequence: Some(v.stop_sequence.into()),
            historical_avg: Some(v.historical_avg.into()),
        }
    }
}

/// Whether `hour` falls in a rush-hour window
pub fn is_peak_hour(hour: i64) -> bool {
    PEAK_HOURS.contains(&hour)
}

/// Canonicalize against the local wall clock
pub fn canonicalize(ctx: &RawContext) -> Result<FeatureVector> {
    canonicalize_at(ctx, Local::now().naive_local())
}

/// Canonicalize, taking time-dependent defaults from `now`.
///
/// Missing fields are defaulted independently:
///
/// | field | default |
/// |---|---|
/// | `stop_id` | 0 |
/// | `hour` | `now`'s hour |
/// | `day_of_week` | `now`'s weekday (Monday = 0) |
/// | `is_peak_hour` | whether `hour` is 7-9 or 17-19 |
/// | `current_occupancy` | 20 |
/// | `stop_sequence` | 0.5 |
/// | `historical_avg` | 5.0 |
///
/// Out-of-range hours and weekdays pass through unchanged. The only failure
/// is a present value that cannot be read as a number.
pub fn canonicalize_at(ctx: &RawContext, now: NaiveDateTime) -> Result<FeatureVector> {
    let int_or = |value: &Option<FieldValue>, field: &'static str, default: i64| match value {
        Some(v) => v.as_i64(field),
        None => Ok(default),
    };
    let real_or = |value: &Option<FieldValue>, field: &'static str, default: f64| match value {
        Some(v) => v.as_f64(field),
        None => Ok(default),
    };

    let hour = int_or(&ctx.hour, "hour", now.hour() as i64)?;
    let day_of_week = int_or(
        &ctx.day_of_week,
        "day_of_week",
        now.weekday().num_days_from_monday() as i64,
    )?;
    let is_peak = match &ctx.is_peak_hour {
        Some(v) => v.as_flag("is_peak_hour")?,
        None => is_peak_hour(hour),
    };

    Ok(FeatureVector {
        stop_id: int_or(&ctx.stop_id, "stop_id", DEFAULT_STOP_ID)?,
        hour,
        day_of_week,
        is_peak_hour: is_peak,
        current_occupancy: int_or(&ctx.current_occupancy, "current_occupancy", DEFAULT_OCCUPANCY)?,
        stop_sequence: real_or(&ctx.stop_sequence, "stop_sequence", DEFAULT_STOP_SEQUENCE)?,
        historical_avg: real_or(&ctx.historical_avg, "historical_avg", DEFAULT_HISTORICAL_AVG)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn monday_8am() -> NaiveDateTime {
        // 2024-01-01 was a Monday
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap()
    }

    fn wednesday_14h() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 3)
            .unwrap()
            .and_hms_opt(14, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_defaults_from_stop_id_only() {
        let ctx: RawContext = serde_json::from_value(json!({ "stop_id": 3 })).unwrap();
        let v = canonicalize_at(&ctx, monday_8am()).unwrap();

        assert_eq!(v.stop_id, 3);
        assert_eq!(v.hour, 8);
        assert_eq!(v.day_of_week, 0);
        assert!(v.is_peak_hour);
        assert_eq!(v.current_occupancy, 20);
        assert_eq!(v.stop_sequence, 0.5);
        assert_eq!(v.historical_avg, 5.0);

        let v = canonicalize_at(&ctx, wednesday_14h()).unwrap();
        assert_eq!(v.hour, 14);
        assert_eq!(v.day_of_week, 2);
        assert!(!v.is_peak_hour);
    }

    #[test]
    fn test_empty_context() {
        let v = canonicalize_at(&RawContext::default(), wednesday_14h()).unwrap();
        assert_eq!(v.stop_id, 0);
        assert_eq!(v.to_array(), [0.0, 14.0, 2.0, 0.0, 20.0, 0.5, 5.0]);
    }

    #[test]
    fn test_peak_default_follows_given_hour() {
        let ctx: RawContext = serde_json::from_value(json!({ "hour": 18 })).unwrap();
        let v = canonicalize_at(&ctx, wednesday_14h()).unwrap();
        assert_eq!(v.hour, 18);
        assert!(v.is_peak_hour);
    }

    #[test]
    fn test_type_coercion() {
        let ctx: RawContext = serde_json::from_value(json!({
            "stop_id": "4",
            "hour": 8.9,
            "day_of_week": true,
            "is_peak_hour": 2,
            "current_occupancy": "15",
            "stop_sequence": 1,
            "historical_avg": "8.5"
        }))
        .unwrap();
        let v = canonicalize_at(&ctx, wednesday_14h()).unwrap();

        assert_eq!(v.stop_id, 4);
        assert_eq!(v.hour, 8);
        assert_eq!(v.day_of_week, 1);
        assert!(v.is_peak_hour);
        assert_eq!(v.current_occupancy, 15);
        assert_eq!(v.stop_sequence, 1.0);
        assert_eq!(v.historical_avg, 8.5);
    }

    #[test]
    fn test_out_of_range_passes_through() {
        let ctx: RawContext =
            serde_json::from_value(json!({ "hour": 27, "day_of_week": -1 })).unwrap();
        let v = canonicalize_at(&ctx, monday_8am()).unwrap();
        assert_eq!(v.hour, 27);
        assert_eq!(v.day_of_week, -1);
        assert!(!v.is_peak_hour);
    }

    #[test]
    fn test_null_is_missing() {
        let ctx: RawContext =
            serde_json::from_value(json!({ "current_occupancy": null })).unwrap();
        let v = canonicalize_at(&ctx, monday_8am()).unwrap();
        assert_eq!(v.current_occupancy, 20);
    }

    #[test]
    fn test_malformed_value_is_reported() {
        let ctx: RawContext = serde_json::from_value(json!({ "hour": "noon" })).unwrap();
        let err = canonicalize_at(&ctx, monday_8am()).unwrap_err();

        match err {
            Error::MalformedFeature { field, .. } => assert_eq!(field, "hour"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_peak_hours() {
        let peaks: Vec<i64> = (0..24).filter(|&h| is_peak_hour(h)).collect();
        assert_eq!(peaks, vec![7, 8, 9, 17, 18, 19]);
    }
}
