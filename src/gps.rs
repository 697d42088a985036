//! GPS day-file parsing.
//!
//! One CSV file holds one day of raw pings for all vehicles. The date is
//! taken from the file name, and timestamps are kept as naive wall-clock
//! times so that hour buckets follow the local calendar.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime};
use serde::Deserialize;

use crate::error::{PipelineError, Result};

/// A single raw GPS sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Ping {
    pub vehicle_id: String,
    pub timestamp: NaiveDateTime,
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Deserialize)]
struct PingRow {
    #[serde(alias = "anonymized_vehicle")]
    vehicle_id: String,
    #[serde(alias = "datetime")]
    timestamp: String,
    lat: f64,
    lng: f64,
}

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"];

/// Parses a timestamp into local wall-clock time.
///
/// Timestamps carrying a UTC offset keep the wall-clock time at that offset
/// rather than being normalized to UTC.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
            return Some(dt.naive_local());
        }
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

/// Extracts the first `YYYY-MM-DD` substring of a file name.
pub fn date_from_file_name(name: &str) -> Option<&str> {
    const PATTERN: &[u8] = b"dddd-dd-dd";
    let bytes = name.as_bytes();
    if bytes.len() < PATTERN.len() {
        return None;
    }

    (0..=bytes.len() - PATTERN.len())
        .find(|&start| {
            bytes[start..start + PATTERN.len()]
                .iter()
                .zip(PATTERN)
                .all(|(&b, &p)| match p {
                    b'd' => b.is_ascii_digit(),
                    _ => b == p,
                })
        })
        .map(|start| &name[start..start + PATTERN.len()])
}

/// Reads every ping of a day file, failing on the first bad row.
pub fn read_day(path: &Path) -> Result<Vec<Ping>> {
    let file = File::open(path).map_err(|e| PipelineError::input(path, e))?;
    read_pings(file, path)
}

/// Parses pings from any CSV reader. `origin` names the source in errors.
pub fn read_pings<R: Read>(reader: R, origin: &Path) -> Result<Vec<Ping>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut pings = Vec::new();

    for (row_no, result) in rdr.deserialize().enumerate() {
        let row: PingRow = result.map_err(|e| PipelineError::input(origin, e))?;

        let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| {
            PipelineError::input(
                origin,
                format!("row {}: unparseable timestamp {:?}", row_no + 1, row.timestamp),
            )
        })?;

        if !row.lat.is_finite() || !row.lng.is_finite() {
            return Err(PipelineError::input(
                origin,
                format!("row {}: non-finite coordinate", row_no + 1),
            ));
        }

        pings.push(Ping {
            vehicle_id: row.vehicle_id,
            timestamp,
            lat: row.lat,
            lng: row.lng,
        });
    }

    Ok(pings)
}
