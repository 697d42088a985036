//! Map matching: snaps each ping to the nearest node within a radius.

use rayon::prelude::*;

use crate::catalog::NodeId;
use crate::gps::Ping;
use crate::spatial::SpatialIndex;

/// A ping annotated with its matched node. `None` means the vehicle was in
/// transit, away from any node.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedPing {
    pub ping: Ping,
    pub node: Option<NodeId>,
}

/// Match counts for one batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MatchStats {
    pub pings: usize,
    pub matched: usize,
}

impl MatchStats {
    pub fn from_batch(batch: &[MatchedPing]) -> Self {
        Self {
            pings: batch.len(),
            matched: batch.iter().filter(|p| p.node.is_some()).count(),
        }
    }

    /// Share of pings matched to a node, in percent.
    pub fn match_pct(&self) -> f64 {
        if self.pings == 0 {
            0.0
        } else {
            (self.matched as f64 / self.pings as f64) * 100.0
        }
    }
}

pub fn match_ping(ping: &Ping, index: &SpatialIndex, radius_m: f64) -> Option<NodeId> {
    index.nearest(ping.lat, ping.lng, radius_m)
}

/// Annotates every ping of a batch, preserving batch order.
pub fn match_batch(pings: Vec<Ping>, index: &SpatialIndex, radius_m: f64) -> Vec<MatchedPing> {
    pings
        .into_par_iter()
        .map(|ping| {
            let node = match_ping(&ping, index, radius_m);
            MatchedPing { ping, node }
        })
        .collect()
}
