use std::collections::BTreeMap;

use chrono::{NaiveDate, Timelike};

use crate::catalog::NodeId;
use crate::segment::EdgeObservation;

/// Calendar date and hour of an edge's departure, in local wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BucketKey {
    pub date: NaiveDate,
    pub hour: u32,
}

impl BucketKey {
    pub fn assign(edge: &EdgeObservation) -> Self {
        Self {
            date: edge.departure_time.date(),
            hour: edge.departure_time.hour(),
        }
    }

    /// `YYYY-MM-DD`, as used in artifact names and the day index.
    pub fn date_label(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

/// All edge observations that departed within one hour of one day.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HourBucket {
    /// Per-vehicle observations in chronological order.
    pub vehicles: BTreeMap<String, Vec<EdgeObservation>>,
    /// Observed speeds per directed node pair.
    pub speeds: BTreeMap<(NodeId, NodeId), Vec<f64>>,
}

impl HourBucket {
    pub fn accumulate(&mut self, vehicle_id: &str, edge: EdgeObservation) {
        self.speeds
            .entry((edge.from_node, edge.to_node))
            .or_default()
            .push(edge.speed_kmh);

        match self.vehicles.get_mut(vehicle_id) {
            Some(edges) => edges.push(edge),
            None => {
                self.vehicles.insert(vehicle_id.to_string(), vec![edge]);
            }
        }
    }

    /// Folds `other` into this bucket. Vehicle lists are re-sorted by
    /// departure time; the sort is stable, so equal departures keep the
    /// order in which the buckets were merged.
    pub fn merge(&mut self, other: HourBucket) {
        for (pair, speeds) in other.speeds {
            self.speeds.entry(pair).or_default().extend(speeds);
        }
        for (vehicle_id, edges) in other.vehicles {
            let list = self.vehicles.entry(vehicle_id).or_default();
            list.extend(edges);
            list.sort_by_key(|e| e.departure_time);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.values().all(Vec::is_empty)
    }

    pub fn edge_count(&self) -> usize {
        self.vehicles.values().map(Vec::len).sum()
    }
}

/// Buckets of one processing batch, ordered by date then hour.
pub type DayBuckets = BTreeMap<BucketKey, HourBucket>;

/// Routes an edge to its bucket, creating the bucket on first use.
pub fn accumulate(buckets: &mut DayBuckets, vehicle_id: &str, edge: EdgeObservation) {
    buckets
        .entry(BucketKey::assign(&edge))
        .or_default()
        .accumulate(vehicle_id, edge);
}

/// Merges the buckets of one day into the run-wide set. Buckets keyed by
/// the same `(date, hour)` are combined.
pub fn merge_buckets(into: &mut DayBuckets, from: DayBuckets) {
    for (key, bucket) in from {
        match into.get_mut(&key) {
            Some(existing) => existing.merge(bucket),
            None => {
                into.insert(key, bucket);
            }
        }
    }
}
