//! Writing of the `nodes`, chunk and `index` artifacts.
//!
//! All artifacts are JSON files in a single output directory. Chunks can
//! additionally be written as NDJSON, one edge object per line.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::catalog::NodeCatalog;
use crate::error::Result;
use crate::shard::bucket::BucketKey;
use crate::shard::types::{AggEdge, Chunk, DayIndex, VehicleEdge};

pub const NODES_FILE: &str = "nodes.json";
pub const INDEX_FILE: &str = "index.json";

/// Deletes `dir` with all its contents if it exists, then recreates it empty.
pub fn prepare_output_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        info!(dir = %dir.display(), "Removing previous output directory");
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)?;
    Ok(())
}

/// Serializes `value` as compact JSON into `path`.
pub fn write_json(path: &Path, value: &impl Serialize) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, value)?;
    writer.flush()?;
    debug!(path = %path.display(), "Wrote JSON artifact");
    Ok(())
}

pub fn write_nodes(dir: &Path, catalog: &NodeCatalog) -> Result<PathBuf> {
    let path = dir.join(NODES_FILE);
    write_json(&path, &catalog.meta())?;
    Ok(path)
}

/// `{date}_{hour}` with the hour unpadded.
pub fn chunk_stem(key: &BucketKey) -> String {
    format!("{}_{}", key.date_label(), key.hour)
}

pub fn write_chunk(dir: &Path, key: &BucketKey, chunk: &Chunk) -> Result<PathBuf> {
    let path = dir.join(format!("{}.json", chunk_stem(key)));
    write_json(&path, chunk)?;
    Ok(path)
}

pub fn write_index(dir: &Path, index: &DayIndex) -> Result<PathBuf> {
    let path = dir.join(INDEX_FILE);
    write_json(&path, index)?;
    Ok(path)
}

#[derive(Serialize)]
struct TaggedVehicleEdge<'a> {
    vid: &'a str,
    #[serde(flatten)]
    edge: &'a VehicleEdge,
}

/// Flattens a chunk into NDJSON: aggregate edges first, then every vehicle
/// edge tagged with its vehicle id.
pub fn chunk_to_ndjson(chunk: &Chunk) -> Result<String> {
    let mut lines = Vec::with_capacity(chunk.agg.len());

    for agg in &chunk.agg {
        lines.push(serde_json::to_string::<AggEdge>(agg)?);
    }
    for (vid, edges) in &chunk.veh {
        for edge in edges {
            lines.push(serde_json::to_string(&TaggedVehicleEdge { vid, edge })?);
        }
    }

    Ok(lines.join("\n"))
}

pub fn write_chunk_ndjson(dir: &Path, key: &BucketKey, chunk: &Chunk) -> Result<PathBuf> {
    let path = dir.join(format!("{}.ndjson", chunk_stem(key)));
    fs::write(&path, chunk_to_ndjson(chunk)?)?;
    Ok(path)
}

pub fn read_chunk(path: &Path) -> Result<Chunk> {
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Converts every chunk JSON in `dir` to a sibling `.ndjson` file.
///
/// The nodes and index artifacts are left alone. Files that do not parse as
/// chunks are skipped. Returns the paths written.
pub fn convert_dir_to_ndjson(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut sources: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            let is_json = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("json"));
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            is_json && name != NODES_FILE && name != INDEX_FILE
        })
        .collect();
    sources.sort();

    let mut written = Vec::new();
    for src in sources {
        let chunk = match read_chunk(&src) {
            Ok(chunk) => chunk,
            Err(e) => {
                warn!(path = %src.display(), error = %e, "Skipping unreadable chunk");
                continue;
            }
        };

        let dst = src.with_extension("ndjson");
        fs::write(&dst, chunk_to_ndjson(&chunk)?)?;
        written.push(dst);
    }

    info!(dir = %dir.display(), converted = written.len(), "NDJSON conversion complete");
    Ok(written)
}
