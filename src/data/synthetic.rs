//! Synthetic passenger demand generator
//!
//! Produces plausible hourly boarding/alighting counts for a single route so
//! the engine can be trained without real ridership exports.

use super::records::RawRecord;
use crate::error::{Error, Result};
use crate::features::{is_peak_hour, FieldValue};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Service runs from 6:00 to the 22:00 departure
const OPERATING_HOURS: std::ops::RangeInclusive<u32> = 6..=22;
const MAX_OCCUPANCY: i64 = 40;

/// Kind of stop, which sets its base demand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopType {
    Residential,
    Commercial,
    TransitHub,
    Terminal,
}

impl StopType {
    /// Layout of the reference ten-stop route
    pub const ROUTE: [StopType; 10] = [
        StopType::Residential,
        StopType::Commercial,
        StopType::TransitHub,
        StopType::Residential,
        StopType::Commercial,
        StopType::Residential,
        StopType::Commercial,
        StopType::TransitHub,
        StopType::Residential,
        StopType::Terminal,
    ];

    pub fn for_stop(stop_id: usize) -> Self {
        Self::ROUTE[stop_id % Self::ROUTE.len()]
    }

    pub fn name(&self) -> &'static str {
        match self {
            StopType::Residential => "residential",
            StopType::Commercial => "commercial",
            StopType::TransitHub => "transit_hub",
            StopType::Terminal => "terminal",
        }
    }

    /// Mean boardings per hour before time-of-day effects
    pub fn base_demand(&self) -> f64 {
        match self {
            StopType::Residential => 5.0,
            StopType::Commercial => 8.0,
            StopType::TransitHub => 12.0,
            StopType::Terminal => 15.0,
        }
    }
}

/// Generator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticConfig {
    pub num_days: usize,
    pub num_stops: usize,
    pub start_date: NaiveDate,
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            num_days: 180,
            num_stops: 10,
            // a Monday
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
            seed: 42,
        }
    }
}

/// One generated row, including descriptive columns the engine ignores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticRow {
    pub timestamp: NaiveDateTime,
    pub stop_id: i64,
    pub stop_type: StopType,
    pub hour: i64,
    pub day_of_week: i64,
    pub is_weekend: bool,
    pub is_peak_hour: bool,
    pub current_occupancy: i64,
    pub stop_sequence: f64,
    pub historical_avg: f64,
    pub boardings: u32,
    pub alightings: u32,
}

impl SyntheticRow {
    pub fn to_record(&self) -> RawRecord {
        RawRecord {
            stop_id: Some(FieldValue::Int(self.stop_id)),
            hour: Some(FieldValue::Int(self.hour)),
            day_of_week: Some(FieldValue::Int(self.day_of_week)),
            is_peak_hour: Some(FieldValue::Bool(self.is_peak_hour)),
            current_occupancy: Some(FieldValue::Int(self.current_occupancy)),
            stop_sequence: Some(FieldValue::Float(self.stop_sequence)),
            historical_avg: Some(FieldValue::Float(self.historical_avg)),
            boardings: Some(FieldValue::Int(self.boardings as i64)),
            alightings: Some(FieldValue::Int(self.alightings as i64)),
        }
    }
}

/// Expected boardings for a stop at a given time
pub fn base_demand(
    stop_type: StopType,
    hour: u32,
    is_weekend: bool,
    stop_id: usize,
    num_stops: usize,
) -> f64 {
    let residential = stop_type == StopType::Residential;

    let mut time_mult = match hour {
        7..=9 => {
            if residential {
                2.0
            } else {
                1.5
            }
        }
        17..=19 => {
            if residential {
                1.5
            } else {
                2.0
            }
        }
        12 | 13 if stop_type == StopType::Commercial => 1.3,
        h if h < 7 || h > 20 => 0.4,
        _ => 1.0,
    };

    if is_weekend {
        time_mult *= 0.6;
    }

    // first and last stops see more activity
    let position_mult = if stop_id == 0 || stop_id + 1 == num_stops {
        1.3
    } else {
        1.0
    };

    stop_type.base_demand() * time_mult * position_mult
}

/// Generate rows for every operating hour, stop and day
pub fn generate(config: &SyntheticConfig) -> Result<Vec<SyntheticRow>> {
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let occupancy = normal(20.0, 8.0)?;
    let avg_noise = normal(0.0, 1.0)?;

    let mut rows = Vec::with_capacity(config.num_days * OPERATING_HOURS.count() * config.num_stops);

    for day in 0..config.num_days {
        let date = config.start_date + Duration::days(day as i64);
        let day_of_week = date.weekday().num_days_from_monday() as i64;
        let is_weekend = day_of_week >= 5;

        for hour in OPERATING_HOURS {
            for stop_id in 0..config.num_stops {
                let stop_type = StopType::for_stop(stop_id);
                let base = base_demand(stop_type, hour, is_weekend, stop_id, config.num_stops);

                let boardings = normal(base, base * 0.3)?.sample(&mut rng);
                let alightings = normal(base * 0.7, base * 0.25)?.sample(&mut rng);
                let current_occupancy =
                    (occupancy.sample(&mut rng) as i64).clamp(0, MAX_OCCUPANCY);
                let historical_avg = base + avg_noise.sample(&mut rng);

                let stop_sequence = if config.num_stops > 1 {
                    stop_id as f64 / (config.num_stops - 1) as f64
                } else {
                    0.0
                };

                rows.push(SyntheticRow {
                    timestamp: date.and_hms_opt(hour, 0, 0).unwrap_or_default(),
                    stop_id: stop_id as i64,
                    stop_type,
                    hour: hour as i64,
                    day_of_week,
                    is_weekend,
                    is_peak_hour: is_peak_hour(hour as i64),
                    current_occupancy,
                    stop_sequence,
                    historical_avg,
                    boardings: boardings.max(0.0) as u32,
                    alightings: alightings.max(0.0) as u32,
                });
            }
        }
    }

    Ok(rows)
}

fn normal(mean: f64, std_dev: f64) -> Result<Normal<f64>> {
    Normal::new(mean, std_dev).map_err(|e| Error::Config(format!("normal({mean}, {std_dev}): {e}")))
}

/// Save generated rows to CSV
pub fn save_rows_csv<P: AsRef<Path>>(rows: &[SyntheticRow], path: P) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::records::load_records_csv;
    use tempfile::tempdir;

    fn small() -> SyntheticConfig {
        SyntheticConfig {
            num_days: 7,
            num_stops: 10,
            ..Default::default()
        }
    }

    #[test]
    fn test_row_count_and_ranges() {
        let rows = generate(&small()).unwrap();
        assert_eq!(rows.len(), 7 * 17 * 10);

        for row in &rows {
            assert!((6..=22).contains(&row.hour));
            assert!((0..=40).contains(&row.current_occupancy));
            assert!((0.0..=1.0).contains(&row.stop_sequence));
            assert_eq!(row.is_peak_hour, is_peak_hour(row.hour));
            assert_eq!(row.is_weekend, row.day_of_week >= 5);
        }
    }

    #[test]
    fn test_seeded_generation_is_reproducible() {
        assert_eq!(generate(&small()).unwrap(), generate(&small()).unwrap());
    }

    #[test]
    fn test_base_demand() {
        // transit hub, weekday morning peak, middle of route
        assert_eq!(base_demand(StopType::TransitHub, 8, false, 2, 10), 18.0);
        // residential, morning peak
        assert_eq!(base_demand(StopType::Residential, 8, false, 3, 10), 10.0);
        // commercial lunch
        assert_eq!(base_demand(StopType::Commercial, 12, false, 1, 10), 8.0 * 1.3);
        // terminal, late evening, weekend, last stop
        let late = base_demand(StopType::Terminal, 22, true, 9, 10);
        assert!((late - 15.0 * 0.4 * 0.6 * 1.3).abs() < 1e-12);
    }

    #[test]
    fn test_csv_round_trip_into_records() {
        let rows = generate(&SyntheticConfig {
            num_days: 1,
            num_stops: 3,
            ..Default::default()
        })
        .unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("training_data.csv");
        save_rows_csv(&rows, &path).unwrap();

        let records = load_records_csv(&path).unwrap();
        assert_eq!(records.len(), rows.len());
        assert_eq!(
            records[0].targets().unwrap(),
            (rows[0].boardings, rows[0].alightings)
        );
    }
}
