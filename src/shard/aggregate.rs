use crate::catalog::NodeCatalog;
use crate::geo::round1;
use crate::shard::bucket::HourBucket;
use crate::shard::types::{AggEdge, Chunk, VehicleEdge};

/// Arithmetic mean. Returns 0.0 for empty input.
fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Summarizes each directed node pair of a bucket.
///
/// `tm` is the time needed to cover the great-circle distance at the mean
/// speed, not the mean of observed travel times. It is zero when the mean
/// speed is zero.
pub fn aggregate_bucket(bucket: &HourBucket, catalog: &NodeCatalog) -> Vec<AggEdge> {
    bucket
        .speeds
        .iter()
        .map(|(&(from, to), speeds)| {
            let avg_speed = mean(speeds);
            let avg_time = match catalog.distance_m(from, to) {
                Some(meters) if avg_speed > 0.0 => (meters / 1000.0) / (avg_speed / 3600.0),
                _ => 0.0,
            };

            AggEdge {
                f: from,
                t: to,
                s: round1(avg_speed),
                tm: round1(avg_time),
                c: speeds.len(),
            }
        })
        .collect()
}

/// Builds the serialized form of a bucket.
pub fn to_chunk(bucket: &HourBucket, catalog: &NodeCatalog) -> Chunk {
    let veh = bucket
        .vehicles
        .iter()
        .filter(|(_, edges)| !edges.is_empty())
        .map(|(vehicle, edges)| {
            let edges = edges
                .iter()
                .map(|e| VehicleEdge {
                    f: e.from_node,
                    t: e.to_node,
                    s: round1(e.speed_kmh),
                    tm: round1(e.travel_seconds),
                })
                .collect();
            (vehicle.clone(), edges)
        })
        .collect();

    Chunk {
        agg: aggregate_bucket(bucket, catalog),
        veh,
    }
}
