//! Trajectory segmentation.
//!
//! Each vehicle's time-ordered pings drive a small state machine that
//! remembers the last node the vehicle was resolved to and the last time it
//! was seen there. Arriving at a different node closes a transition, which
//! becomes an [`EdgeObservation`] when its duration is plausible.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use crate::catalog::{NodeCatalog, NodeId};
use crate::geo::speed_kmh;
use crate::matcher::MatchedPing;

/// One timed transition between two distinct nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeObservation {
    pub from_node: NodeId,
    pub to_node: NodeId,
    pub departure_time: NaiveDateTime,
    pub travel_seconds: f64,
    pub speed_kmh: f64,
}

/// Open interval of accepted travel durations, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TravelWindow {
    pub min_s: f64,
    pub max_s: f64,
}

impl Default for TravelWindow {
    fn default() -> Self {
        Self {
            min_s: 5.0,
            max_s: 5400.0,
        }
    }
}

impl TravelWindow {
    pub fn accepts(&self, seconds: f64) -> bool {
        self.min_s < seconds && seconds < self.max_s
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct SegmenterState {
    pub last_node: Option<NodeId>,
    pub departure_time: Option<NaiveDateTime>,
}

/// What consuming one ping produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// No transition completed.
    Idle,
    Edge(EdgeObservation),
    /// A transition completed but its duration was outside the window.
    Filtered { travel_seconds: f64 },
}

impl Step {
    pub fn into_edge(self) -> Option<EdgeObservation> {
        match self {
            Step::Edge(edge) => Some(edge),
            _ => None,
        }
    }
}

/// Advances the state machine by one ping.
///
/// Unmatched pings leave the state untouched. Every matched ping re-arms
/// `departure_time`, including pings at the node the vehicle is already at.
pub fn step(
    state: SegmenterState,
    ping: &MatchedPing,
    catalog: &NodeCatalog,
    window: TravelWindow,
) -> (SegmenterState, Step) {
    let Some(curr) = ping.node else {
        return (state, Step::Idle);
    };
    let curr_time = ping.ping.timestamp;

    let outcome = match (state.last_node, state.departure_time) {
        (Some(last), Some(departure)) if last != curr => {
            let travel_seconds = (curr_time - departure).num_milliseconds() as f64 / 1000.0;
            if window.accepts(travel_seconds) {
                match catalog.distance_m(last, curr) {
                    Some(meters) => Step::Edge(EdgeObservation {
                        from_node: last,
                        to_node: curr,
                        departure_time: departure,
                        travel_seconds,
                        speed_kmh: speed_kmh(meters, travel_seconds),
                    }),
                    None => Step::Idle,
                }
            } else {
                Step::Filtered { travel_seconds }
            }
        }
        _ => Step::Idle,
    };

    let next = SegmenterState {
        last_node: Some(curr),
        departure_time: Some(curr_time),
    };
    (next, outcome)
}

/// Counts for one or more segmented trajectories.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SegmentStats {
    pub edges: usize,
    pub filtered: usize,
}

impl SegmentStats {
    pub fn merge(self, other: SegmentStats) -> SegmentStats {
        SegmentStats {
            edges: self.edges + other.edges,
            filtered: self.filtered + other.filtered,
        }
    }
}

/// Segments a time-sorted trajectory into edge observations.
pub fn segment(
    trajectory: &[MatchedPing],
    catalog: &NodeCatalog,
    window: TravelWindow,
) -> (Vec<EdgeObservation>, SegmentStats) {
    let mut state = SegmenterState::default();
    let mut edges = Vec::new();
    let mut stats = SegmentStats::default();

    for ping in trajectory {
        let (next, outcome) = step(state, ping, catalog, window);
        state = next;
        match outcome {
            Step::Edge(edge) => {
                stats.edges += 1;
                edges.push(edge);
            }
            Step::Filtered { .. } => stats.filtered += 1,
            Step::Idle => {}
        }
    }

    (edges, stats)
}

/// Splits a batch into per-vehicle trajectories sorted by time. Equal
/// timestamps keep their batch order.
pub fn group_by_vehicle(batch: Vec<MatchedPing>) -> BTreeMap<String, Vec<MatchedPing>> {
    let mut groups: BTreeMap<String, Vec<MatchedPing>> = BTreeMap::new();
    for ping in batch {
        groups
            .entry(ping.ping.vehicle_id.clone())
            .or_default()
            .push(ping);
    }
    for trajectory in groups.values_mut() {
        trajectory.sort_by_key(|p| p.ping.timestamp);
    }
    groups
}
