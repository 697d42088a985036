use std::fs;
use std::path::{Path, PathBuf};

use traffic_shards::catalog::NodeCatalog;
use traffic_shards::config::PipelineConfig;
use traffic_shards::output::read_chunk;
use traffic_shards::pipeline;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn catalog() -> NodeCatalog {
    let bytes = fs::read(fixture("nodes.csv")).expect("Failed to read node fixture");
    NodeCatalog::from_csv(bytes.as_slice()).expect("Failed to parse node fixture")
}

fn config(name: &str) -> PipelineConfig {
    PipelineConfig {
        output_dir: std::env::temp_dir().join(name),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_full_pipeline() {
    let config = config("traffic_shards_it_full");
    let out = config.output_dir.clone();
    fs::create_dir_all(&out).unwrap();
    fs::write(out.join("stale_2020-01-01_3.json"), "{}").unwrap();

    let summary = pipeline::run(catalog(), &fixture("gps"), config)
        .await
        .unwrap();

    assert_eq!(summary.days_written, 1);
    assert_eq!(summary.hours_written, 2);
    assert_eq!(summary.skipped.len(), 1);
    assert!(
        summary.skipped[0]
            .file
            .ends_with("anonymized_raw_2025-04-02.csv")
    );

    let mut files: Vec<String> = fs::read_dir(&out)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    files.sort();
    assert_eq!(
        files,
        vec![
            "2025-04-01_17.json",
            "2025-04-01_8.json",
            "index.json",
            "nodes.json"
        ]
    );

    let index = fs::read_to_string(out.join("index.json")).unwrap();
    assert_eq!(index, r#"{"2025-04-01":[8,17]}"#);

    let nodes: serde_json::Value =
        serde_json::from_slice(&fs::read(out.join("nodes.json")).unwrap()).unwrap();
    assert_eq!(nodes.as_object().unwrap().len(), 3);
    assert_eq!(nodes["1"]["name"], "Ben Thanh");

    let eight = read_chunk(&out.join("2025-04-01_8.json")).unwrap();
    let pairs: Vec<_> = eight.agg.iter().map(|a| (a.f, a.t, a.c)).collect();
    assert_eq!(pairs, vec![(1, 2, 2), (2, 3, 1)]);
    assert_eq!(eight.agg[0].s, 10.0);
    assert_eq!(eight.agg[0].tm, 400.0);
    assert!(!eight.veh.contains_key("V2"));

    let v1: Vec<_> = eight.veh["V1"]
        .iter()
        .map(|e| (e.f, e.t, e.s, e.tm))
        .collect();
    assert_eq!(v1, vec![(1, 2, 13.3, 300.0), (2, 3, 4.4, 900.0)]);
    assert_eq!(eight.veh["V3"][0].s, 6.7);

    let five_pm = read_chunk(&out.join("2025-04-01_17.json")).unwrap();
    assert_eq!(five_pm.agg.len(), 1);
    assert_eq!((five_pm.agg[0].f, five_pm.agg[0].t), (2, 1));
    assert_eq!(five_pm.agg[0].s, 16.7);
    assert_eq!(five_pm.veh["V1"][0].tm, 240.0);

    fs::remove_dir_all(&out).unwrap();
}

#[tokio::test]
async fn test_rerun_on_subset_is_byte_identical() {
    let full = config("traffic_shards_it_rerun_full");
    let full_out = full.output_dir.clone();
    pipeline::run(catalog(), &fixture("gps"), full).await.unwrap();

    let subset_dir = std::env::temp_dir().join("traffic_shards_it_rerun_input");
    let _ = fs::remove_dir_all(&subset_dir);
    fs::create_dir_all(&subset_dir).unwrap();
    fs::copy(
        fixture("gps/anonymized_raw_2025-04-01.csv"),
        subset_dir.join("anonymized_raw_2025-04-01.csv"),
    )
    .unwrap();

    let subset = PipelineConfig {
        concurrency: 1,
        ..config("traffic_shards_it_rerun_subset")
    };
    let subset_out = subset.output_dir.clone();
    let summary = pipeline::run(catalog(), &subset_dir, subset).await.unwrap();
    assert!(summary.skipped.is_empty());

    for name in ["2025-04-01_8.json", "2025-04-01_17.json", "index.json"] {
        assert_eq!(
            fs::read(full_out.join(name)).unwrap(),
            fs::read(subset_out.join(name)).unwrap(),
            "{name} differs"
        );
    }

    fs::remove_dir_all(&full_out).unwrap();
    fs::remove_dir_all(&subset_out).unwrap();
    fs::remove_dir_all(&subset_dir).unwrap();
}

#[tokio::test]
async fn test_edge_after_midnight_joins_next_date_shard() {
    let input = std::env::temp_dir().join("traffic_shards_it_midnight_input");
    let _ = fs::remove_dir_all(&input);
    fs::create_dir_all(&input).unwrap();
    fs::write(
        input.join("anonymized_raw_2025-04-01.csv"),
        "vehicle_id,timestamp,lat,lng\n\
         V1,2025-04-01 23:58:00,10.0,106.0\n\
         V1,2025-04-02 00:01:00,10.0,106.0\n\
         V1,2025-04-02 00:06:00,10.01,106.0\n",
    )
    .unwrap();
    fs::write(
        input.join("anonymized_raw_2025-04-02.csv"),
        "vehicle_id,timestamp,lat,lng\n\
         V2,2025-04-02 00:10:00,10.0,106.0\n\
         V2,2025-04-02 00:15:00,10.01,106.0\n",
    )
    .unwrap();

    let config = config("traffic_shards_it_midnight");
    let out = config.output_dir.clone();
    let summary = pipeline::run(catalog(), &input, config).await.unwrap();

    assert_eq!(summary.days.len(), 2);
    assert_eq!(summary.days_written, 1);
    assert_eq!(summary.hours_written, 1);
    assert_eq!(
        fs::read_to_string(out.join("index.json")).unwrap(),
        r#"{"2025-04-02":[0]}"#
    );

    let chunk = read_chunk(&out.join("2025-04-02_0.json")).unwrap();
    assert_eq!(chunk.agg.len(), 1);
    assert_eq!((chunk.agg[0].f, chunk.agg[0].t, chunk.agg[0].c), (1, 2, 2));
    assert_eq!(chunk.veh["V1"][0].tm, 300.0);
    assert_eq!(chunk.veh["V2"][0].tm, 300.0);

    fs::remove_dir_all(&out).unwrap();
    fs::remove_dir_all(&input).unwrap();
}

#[tokio::test]
async fn test_ndjson_sidecars() {
    let config = PipelineConfig {
        ndjson: true,
        ..config("traffic_shards_it_ndjson")
    };
    let out = config.output_dir.clone();
    pipeline::run(catalog(), &fixture("gps"), config).await.unwrap();

    let text = fs::read_to_string(out.join("2025-04-01_8.ndjson")).unwrap();
    let lines: Vec<serde_json::Value> = text
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    // 2 aggregate edges + 3 vehicle edges
    assert_eq!(lines.len(), 5);
    assert_eq!(lines[2]["vid"], "V1");
    assert_eq!(lines[4]["vid"], "V3");

    fs::remove_dir_all(&out).unwrap();
}

#[tokio::test]
async fn test_missing_gps_dir_is_error() {
    let config = config("traffic_shards_it_missing_dir");
    let out = config.output_dir.clone();
    let result = pipeline::run(catalog(), Path::new("/nonexistent/gps"), config).await;
    assert!(result.is_err());
    let _ = fs::remove_dir_all(&out);
}

#[test]
fn test_malformed_catalog_is_fatal() {
    let csv = "cluster_label,centroid_lat\n1,10.0\n";
    assert!(NodeCatalog::from_csv(csv.as_bytes()).is_err());
}
