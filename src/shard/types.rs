//! Serialized shapes of the chunk and index artifacts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalog::NodeId;

/// Per-bucket summary of all observations for one directed node pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggEdge {
    pub f: NodeId,
    pub t: NodeId,
    /// Mean speed, km/h.
    pub s: f64,
    /// Travel time implied by the mean speed, seconds.
    pub tm: f64,
    pub c: usize,
}

/// One vehicle's traversal of an edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleEdge {
    pub f: NodeId,
    pub t: NodeId,
    pub s: f64,
    pub tm: f64,
}

/// Contents of one `{date}_{hour}.json` artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub agg: Vec<AggEdge>,
    pub veh: BTreeMap<String, Vec<VehicleEdge>>,
}

/// Contents of `index.json`: date to the sorted hours that have a chunk.
pub type DayIndex = BTreeMap<String, Vec<u32>>;
