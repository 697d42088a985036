//! CLI entry point for the traffic shard builder.
//!
//! Provides subcommands for building the hourly traffic shards from a node
//! catalog and daily GPS files, and for converting shards to NDJSON.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use traffic_shards::{
    catalog::NodeCatalog,
    config::{
        DEFAULT_MAX_TIME_S, DEFAULT_MIN_TIME_S, DEFAULT_OUTPUT_DIR, DEFAULT_RADIUS_M,
        PipelineConfig,
    },
    output::convert_dir_to_ndjson,
    pipeline,
    source::{BasicClient, load_bytes},
};

#[derive(Parser)]
#[command(name = "traffic_shards")]
#[command(about = "Build hourly traffic graph shards from raw GPS pings", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Match GPS pings to nodes and write one shard per (date, hour).
    ///
    /// WARNING: the output directory is deleted and recreated on every run.
    Build {
        /// Node catalog CSV, as a local path or URL
        #[arg(long, value_name = "FILE_OR_URL")]
        nodes: String,

        /// Directory containing one GPS CSV per day (YYYY-MM-DD in the file name)
        #[arg(long)]
        gps_dir: PathBuf,

        /// Output directory. Existing contents are removed.
        #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR)]
        output_dir: PathBuf,

        /// Map-matching radius in meters
        #[arg(short, long, default_value_t = DEFAULT_RADIUS_M)]
        radius: f64,

        /// Transitions must take longer than this many seconds
        #[arg(long, default_value_t = DEFAULT_MIN_TIME_S)]
        min_time: f64,

        /// Transitions must take less than this many seconds
        #[arg(long, default_value_t = DEFAULT_MAX_TIME_S)]
        max_time: f64,

        /// Maximum number of day files processed at once
        #[arg(short, long, default_value_t = 4)]
        concurrency: usize,

        /// Also write each shard as NDJSON
        #[arg(long, default_value_t = false)]
        ndjson: bool,
    },
    /// Convert the shards of an existing output directory to NDJSON
    Ndjson {
        /// Directory holding the shard JSON files
        #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR)]
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/traffic_shards.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("traffic_shards.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            nodes,
            gps_dir,
            output_dir,
            radius,
            min_time,
            max_time,
            concurrency,
            ndjson,
        } => {
            let config = PipelineConfig {
                radius_m: radius,
                min_time_s: min_time,
                max_time_s: max_time,
                output_dir,
                concurrency,
                ndjson,
            };
            config.validate()?;

            let catalog = load_catalog(&nodes).await?;
            let summary = pipeline::run(catalog, &gps_dir, config).await?;

            if summary.days_written == 0 {
                warn!("No day produced any shard");
            }
        }
        Commands::Ndjson { dir } => {
            let written = convert_dir_to_ndjson(&dir)?;
            info!(files = written.len(), "NDJSON files written");
        }
    }

    Ok(())
}

/// Loads the node catalog. Any failure here is fatal for the run.
#[tracing::instrument]
async fn load_catalog(location: &str) -> Result<NodeCatalog> {
    let client = BasicClient::new()?;
    let bytes = load_bytes(&client, location)
        .await
        .context("node catalog unavailable")?;
    let catalog = NodeCatalog::from_csv(bytes.as_slice())?;
    info!(nodes = catalog.len(), "Node catalog loaded");
    Ok(catalog)
}
