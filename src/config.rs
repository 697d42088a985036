//! Options recognized by a sharding run.

use std::path::PathBuf;

use crate::error::{PipelineError, Result};
use crate::segment::TravelWindow;

pub const DEFAULT_RADIUS_M: f64 = 50.0;
pub const DEFAULT_MIN_TIME_S: f64 = 5.0;
pub const DEFAULT_MAX_TIME_S: f64 = 5400.0;
pub const DEFAULT_OUTPUT_DIR: &str = "traffic_data_chunks";

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Map-matching radius in meters.
    pub radius_m: f64,
    /// Transitions must take strictly longer than this, in seconds.
    pub min_time_s: f64,
    /// Transitions must take strictly less than this, in seconds.
    pub max_time_s: f64,
    /// Deleted and recreated at the start of every run.
    pub output_dir: PathBuf,
    /// Maximum number of day files processed at once.
    pub concurrency: usize,
    /// Also write each chunk as NDJSON.
    pub ndjson: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            radius_m: DEFAULT_RADIUS_M,
            min_time_s: DEFAULT_MIN_TIME_S,
            max_time_s: DEFAULT_MAX_TIME_S,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            concurrency: 4,
            ndjson: false,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.radius_m.is_finite() || self.radius_m < 0.0 {
            return Err(PipelineError::Config(format!(
                "radius must be a non-negative number of meters, got {}",
                self.radius_m
            )));
        }
        if !self.min_time_s.is_finite() || self.min_time_s < 0.0 {
            return Err(PipelineError::Config(format!(
                "minimum travel time must be non-negative, got {}",
                self.min_time_s
            )));
        }
        if self.max_time_s.is_nan() || self.min_time_s >= self.max_time_s {
            return Err(PipelineError::Config(format!(
                "minimum travel time {} must be below maximum {}",
                self.min_time_s, self.max_time_s
            )));
        }
        if self.concurrency == 0 {
            return Err(PipelineError::Config("concurrency must be at least 1".into()));
        }
        Ok(())
    }

    pub fn travel_window(&self) -> TravelWindow {
        TravelWindow {
            min_s: self.min_time_s,
            max_s: self.max_time_s,
        }
    }
}
