pub mod catalog;
pub mod config;
pub mod error;
pub mod geo;
pub mod gps;
pub mod matcher;
pub mod output;
pub mod pipeline;
pub mod segment;
pub mod shard;
pub mod source;
pub mod spatial;
