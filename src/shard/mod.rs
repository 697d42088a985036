//! Hour-bucket sharding and per-bucket aggregation.
//!
//! Edge observations are grouped by the calendar date and hour of their
//! departure. Aggregate statistics are derived only when a bucket is turned
//! into a [`types::Chunk`] for writing.

pub mod aggregate;
pub mod bucket;
pub mod types;
