//! Day-by-day orchestration of matching, segmentation and sharding.
//!
//! Every GPS day file is handled independently: read, match, segment,
//! bucket by departure date and hour. Days run concurrently on the blocking
//! pool. Their buckets are merged in file order once all days are done, so
//! an edge departing after midnight lands in the next date's shard even
//! when it was recorded in the previous day's file. Chunks and the day
//! index are written from the merged buckets.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::catalog::NodeCatalog;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::gps::{Ping, date_from_file_name, read_day};
use crate::matcher::{MatchStats, match_batch};
use crate::output::{
    prepare_output_dir, write_chunk, write_chunk_ndjson, write_index, write_nodes,
};
use crate::segment::{SegmentStats, group_by_vehicle, segment};
use crate::shard::aggregate::to_chunk;
use crate::shard::bucket::{DayBuckets, accumulate, merge_buckets};
use crate::shard::types::DayIndex;
use crate::spatial::SpatialIndex;

/// Immutable state shared by all day workers.
#[derive(Debug)]
pub struct ShardContext {
    pub catalog: NodeCatalog,
    pub index: SpatialIndex,
    pub config: PipelineConfig,
}

impl ShardContext {
    pub fn new(catalog: NodeCatalog, config: PipelineConfig) -> Self {
        let index = SpatialIndex::build(&catalog);
        Self {
            catalog,
            index,
            config,
        }
    }
}

/// A GPS file and the date its name encodes.
#[derive(Debug, Clone, PartialEq)]
pub struct DayInput {
    pub path: PathBuf,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedDay {
    pub file: PathBuf,
    pub reason: String,
}

/// Outcome of sharding one day in memory.
#[derive(Debug, Default)]
pub struct ShardedDay {
    pub buckets: DayBuckets,
    pub matches: MatchStats,
    pub vehicles: usize,
    pub segments: SegmentStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayReport {
    pub date: String,
    pub file: PathBuf,
    pub pings: usize,
    pub matched: usize,
    pub vehicles: usize,
    pub edges: usize,
    pub filtered: usize,
    /// Non-empty `(date, hour)` buckets this file contributed to.
    pub buckets: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub days_written: usize,
    pub hours_written: usize,
    pub days: Vec<DayReport>,
    pub skipped: Vec<SkippedDay>,
    pub index: DayIndex,
}

/// Lists the day files of `gps_dir` in file-name order.
///
/// Files without a `YYYY-MM-DD` in their name are ignored. A file whose date
/// was already claimed by an earlier file, or whose date is not a real
/// calendar date, is returned as skipped.
pub fn discover_day_files(gps_dir: &Path) -> Result<(Vec<DayInput>, Vec<SkippedDay>)> {
    let mut paths: Vec<PathBuf> = fs::read_dir(gps_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().and_then(|e| e.to_str()) == Some("csv"))
        .collect();
    paths.sort();

    let mut inputs: Vec<DayInput> = Vec::new();
    let mut skipped = Vec::new();

    for path in paths {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        let Some(label) = date_from_file_name(name) else {
            debug!(file = %path.display(), "No date in file name, ignoring");
            continue;
        };

        let date = match NaiveDate::parse_from_str(label, "%Y-%m-%d") {
            Ok(date) => date,
            Err(_) => {
                skipped.push(SkippedDay {
                    reason: format!("invalid date {label} in file name"),
                    file: path,
                });
                continue;
            }
        };

        if inputs.iter().any(|i| i.date == date) {
            skipped.push(SkippedDay {
                reason: format!("duplicate date {label}"),
                file: path,
            });
            continue;
        }

        inputs.push(DayInput { path, date });
    }

    Ok((inputs, skipped))
}

/// Matches, segments and buckets one day of pings without touching disk.
pub fn shard_day(pings: Vec<Ping>, ctx: &ShardContext) -> ShardedDay {
    let matched = match_batch(pings, &ctx.index, ctx.config.radius_m);
    let matches = MatchStats::from_batch(&matched);

    let trajectories = group_by_vehicle(matched);
    let vehicles = trajectories.len();
    let window = ctx.config.travel_window();

    let segmented: Vec<_> = trajectories
        .into_par_iter()
        .map(|(vehicle_id, trajectory)| {
            let (edges, stats) = segment(&trajectory, &ctx.catalog, window);
            (vehicle_id, edges, stats)
        })
        .collect();

    let mut day = ShardedDay {
        matches,
        vehicles,
        ..Default::default()
    };

    for (vehicle_id, edges, stats) in segmented {
        day.segments = day.segments.merge(stats);
        for edge in edges {
            accumulate(&mut day.buckets, &vehicle_id, edge);
        }
    }

    day
}

fn write_chunks(
    dir: &Path,
    buckets: &DayBuckets,
    catalog: &NodeCatalog,
    ndjson: bool,
    written: &mut Vec<PathBuf>,
) -> Result<DayIndex> {
    let mut index = DayIndex::new();
    for (key, bucket) in buckets.iter().filter(|(_, b)| !b.is_empty()) {
        let chunk = to_chunk(bucket, catalog);
        written.push(write_chunk(dir, key, &chunk)?);
        if ndjson {
            written.push(write_chunk_ndjson(dir, key, &chunk)?);
        }
        index.entry(key.date_label()).or_default().push(key.hour);
    }
    Ok(index)
}

/// Writes one chunk per non-empty bucket and returns the day index of what
/// was written.
///
/// Buckets iterate in `(date, hour)` order, so every hour list comes out
/// sorted. If any write fails, the chunks already written are removed.
pub fn flush(
    dir: &Path,
    buckets: &DayBuckets,
    catalog: &NodeCatalog,
    ndjson: bool,
) -> Result<DayIndex> {
    let mut written = Vec::new();
    write_chunks(dir, buckets, catalog, ndjson, &mut written).inspect_err(|_| {
        for path in &written {
            if let Err(e) = fs::remove_file(path) {
                warn!(path = %path.display(), error = %e, "Failed to remove partial chunk");
            }
        }
    })
}

/// Reads and shards one day file. Nothing is written here.
#[tracing::instrument(skip_all, fields(date = %input.date, file = %input.path.display()))]
pub fn process_day(input: &DayInput, ctx: &ShardContext) -> Result<(DayReport, DayBuckets)> {
    let pings = read_day(&input.path)?;
    let day = shard_day(pings, ctx);

    let report = DayReport {
        date: input.date.format("%Y-%m-%d").to_string(),
        file: input.path.clone(),
        pings: day.matches.pings,
        matched: day.matches.matched,
        vehicles: day.vehicles,
        edges: day.segments.edges,
        filtered: day.segments.filtered,
        buckets: day.buckets.values().filter(|b| !b.is_empty()).count(),
    };

    info!(
        pings = report.pings,
        match_pct = day.matches.match_pct(),
        vehicles = report.vehicles,
        edges = report.edges,
        filtered = report.filtered,
        buckets = report.buckets,
        "Day processed"
    );

    Ok((report, day.buckets))
}

/// Runs the whole pipeline over every day file in `gps_dir`.
///
/// The output directory is deleted and recreated first. A day that fails to
/// parse is skipped and reported; it never aborts the run.
///
/// # Errors
///
/// Invalid configuration, an unreadable GPS directory, or failure to
/// prepare the output directory or write any artifact.
#[tracing::instrument(skip(catalog, gps_dir, config), fields(gps_dir = %gps_dir.display()))]
pub async fn run(
    catalog: NodeCatalog,
    gps_dir: &Path,
    config: PipelineConfig,
) -> Result<RunSummary> {
    config.validate()?;
    if catalog.is_empty() {
        return Err(PipelineError::Catalog("catalog contains no nodes".into()));
    }

    let output_dir = config.output_dir.clone();
    prepare_output_dir(&output_dir)?;
    write_nodes(&output_dir, &catalog)?;

    let (inputs, mut skipped) = discover_day_files(gps_dir)?;
    info!(
        nodes = catalog.len(),
        days = inputs.len(),
        radius_m = config.radius_m,
        "Starting sharding run"
    );

    let semaphore = Arc::new(Semaphore::new(config.concurrency));
    let ctx = Arc::new(ShardContext::new(catalog, config));

    let mut tasks = Vec::with_capacity(inputs.len());
    for input in inputs {
        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            break;
        };
        let ctx = ctx.clone();
        let file = input.path.clone();
        let task = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            process_day(&input, &ctx)
        });
        tasks.push((file, task));
    }

    let mut summary = RunSummary::default();
    let mut buckets = DayBuckets::new();

    // Awaited in file order so merged vehicle lists and speed sets are
    // identical across runs.
    for (file, task) in tasks {
        match task.await {
            Ok(Ok((report, day_buckets))) => {
                merge_buckets(&mut buckets, day_buckets);
                summary.days.push(report);
            }
            Ok(Err(e)) => skipped.push(SkippedDay {
                file,
                reason: e.to_string(),
            }),
            Err(e) => skipped.push(SkippedDay {
                file,
                reason: format!("day worker failed: {e}"),
            }),
        }
    }

    summary.index = flush(&output_dir, &buckets, &ctx.catalog, ctx.config.ndjson)?;
    summary.days_written = summary.index.len();
    summary.hours_written = summary.index.values().map(Vec::len).sum();
    write_index(&output_dir, &summary.index)?;
    summary.skipped = skipped;

    for day in &summary.skipped {
        warn!(file = %day.file.display(), reason = %day.reason, "Day skipped");
    }
    info!(
        days_written = summary.days_written,
        hours_written = summary.hours_written,
        skipped = summary.skipped.len(),
        output_dir = %output_dir.display(),
        "Sharding run complete"
    );

    Ok(summary)
}
