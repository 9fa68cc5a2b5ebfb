//! Raw training records and CSV ingest

use crate::error::{Error, Result};
use crate::features::{FieldValue, RawContext};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// One historical observation as it appears in a training file.
///
/// Feature fields are as lenient as a prediction context; the two targets
/// are required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawRecord {
    pub stop_id: Option<FieldValue>,
    pub hour: Option<FieldValue>,
    pub day_of_week: Option<FieldValue>,
    pub is_peak_hour: Option<FieldValue>,
    pub current_occupancy: Option<FieldValue>,
    pub stop_sequence: Option<FieldValue>,
    pub historical_avg: Option<FieldValue>,
    pub boardings: Option<FieldValue>,
    pub alightings: Option<FieldValue>,
}

impl RawRecord {
    /// Build a record from a context and its observed counts
    pub fn new(context: RawContext, boardings: u32, alightings: u32) -> Self {
        Self {
            stop_id: context.stop_id,
            hour: context.hour,
            day_of_week: context.day_of_week,
            is_peak_hour: context.is_peak_hour,
            current_occupancy: context.current_occupancy,
            stop_sequence: context.stop_sequence,
            historical_avg: context.historical_avg,
            boardings: Some(FieldValue::Int(boardings as i64)),
            alightings: Some(FieldValue::Int(alightings as i64)),
        }
    }

    /// The feature part of the record
    pub fn context(&self) -> RawContext {
        RawContext {
            stop_id: self.stop_id.clone(),
            hour: self.hour.clone(),
            day_of_week: self.day_of_week.clone(),
            is_peak_hour: self.is_peak_hour.clone(),
            current_occupancy: self.current_occupancy.clone(),
            stop_sequence: self.stop_sequence.clone(),
            historical_avg: self.historical_avg.clone(),
        }
    }

    /// Validated `(boardings, alightings)` counts
    pub fn targets(&self) -> Result<(u32, u32)> {
        Ok((
            target_count(&self.boardings, "boardings")?,
            target_count(&self.alightings, "alightings")?,
        ))
    }
}

fn target_count(value: &Option<FieldValue>, field: &'static str) -> Result<u32> {
    let value = value
        .as_ref()
        .ok_or_else(|| Error::Schema(format!("missing target `{}`", field)))?;
    let count = value
        .as_f64(field)
        .map_err(|e| Error::Schema(e.to_string()))?;

    if count < 0.0 || count > u32::MAX as f64 {
        return Err(Error::Schema(format!(
            "target `{}` out of range: {}",
            field, count
        )));
    }
    Ok(count.trunc() as u32)
}

/// Read records from any CSV source with a header row.
///
/// Unknown columns are ignored and empty cells count as missing.
pub fn read_records<R: Read>(reader: R) -> Result<Vec<RawRecord>> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut records = Vec::new();

    for (row, result) in reader.deserialize::<RawRecord>().enumerate() {
        let record =
            result.map_err(|e| Error::Schema(format!("row {}: {}", row + 1, e)))?;
        records.push(record);
    }

    Ok(records)
}

/// Load records from a CSV file
pub fn load_records_csv<P: AsRef<Path>>(path: P) -> Result<Vec<RawRecord>> {
    let file = File::open(path.as_ref())?;
    read_records(file)
}

/// Write records with a header row; missing fields become empty cells
pub fn write_records<W: Write>(records: &[RawRecord], writer: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Save records to a CSV file
pub fn save_records_csv<P: AsRef<Path>>(records: &[RawRecord], path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    write_records(records, file)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
timestamp,stop_id,stop_type,hour,day_of_week,is_weekend,is_peak_hour,current_occupancy,stop_sequence,historical_avg,boardings,alightings
2024-01-01T08:00:00,3,transit_hub,8,0,false,true,15,0.3333,12.4,18,11
2024-01-01T09:00:00,4,commercial,9,0,false,True,,0.4444,8.1,9,7
";

    #[test]
    fn test_read_records_ignores_extra_columns() {
        let records = read_records(SAMPLE.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].stop_id, Some(FieldValue::Int(3)));
        assert_eq!(records[0].is_peak_hour, Some(FieldValue::Bool(true)));
        assert_eq!(records[0].targets().unwrap(), (18, 11));

        // empty cell
        assert_eq!(records[1].current_occupancy, None);
        assert!(records[1]
            .context()
            .is_peak_hour
            .unwrap()
            .as_flag("is_peak_hour")
            .unwrap());
    }

    #[test]
    fn test_missing_target_is_schema_error() {
        let record = RawRecord {
            boardings: Some(FieldValue::Int(4)),
            ..Default::default()
        };
        assert!(matches!(record.targets(), Err(Error::Schema(_))));
    }

    #[test]
    fn test_negative_target_is_schema_error() {
        let record = RawRecord {
            boardings: Some(FieldValue::Int(-2)),
            alightings: Some(FieldValue::Int(1)),
            ..Default::default()
        };
        assert!(matches!(record.targets(), Err(Error::Schema(_))));
    }

    #[test]
    fn test_written_records_read_back() {
        let records = read_records(SAMPLE.as_bytes()).unwrap();
        let mut buf = Vec::new();
        write_records(&records, &mut buf).unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("stop_id,hour,day_of_week,is_peak_hour"));
        assert_eq!(read_records(text.as_bytes()).unwrap(), records);
    }
}
