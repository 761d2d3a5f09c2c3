#![allow(missing_docs)]

use std::fs;
use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use graphswap::cost::CalibrationTable;
use serde_json::Value;
use tempfile::TempDir;

const TRACE: &str = r#"{"batch":0,"accesses":{"node_list":{"contains":400,"add":200}},"sizes":{"node_list":{"containers":1,"elements":200}}}
{"batch":1,"accesses":{"node_list":{"contains":400,"add":200}},"sizes":{"node_list":{"containers":1,"elements":400}}}
{"batch":2,"accesses":{"node_list":{"contains":400,"add":200}},"sizes":{"node_list":{"containers":1,"elements":600}}}
{"batch":3,"accesses":{"node_list":{"contains":400,"add":200}},"sizes":{"node_list":{"containers":1,"elements":800}}}
"#;

const CONFIG: &str = r#"
window_size = 2
lower_bound = 0.0
amortization_batches = 3

[candidates]
kind = "cross_product"

[candidates.allowed]
node_list = ["array", "hash_set"]
edge_list = ["array"]
incident_edges = ["array"]
adjacent_nodes = ["array"]
"#;

fn write(dir: &Path, name: &str, contents: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, contents).expect("write fixture");
    path.display().to_string()
}

#[test]
fn calibrate_writes_a_loadable_table() {
    let dir = TempDir::new().expect("tempdir");
    let out = dir.path().join("calibration.toml");
    let output = cargo_bin_cmd!("graphswap")
        .args(["--format", "json", "calibrate", "--size", "32", "--rounds", "1", "--out"])
        .arg(&out)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let report: Value = serde_json::from_slice(&output).expect("json report");
    assert_eq!(report["entries"], 35);

    let table = CalibrationTable::load(&out).expect("load calibration");
    assert_eq!(table.len(), 35);
}

#[test]
fn replay_reports_each_batch() {
    let dir = TempDir::new().expect("tempdir");
    let trace = write(dir.path(), "trace.jsonl", TRACE);
    let config = write(dir.path(), "hotswap.toml", CONFIG);
    let output = cargo_bin_cmd!("graphswap")
        .args(["--format", "json", "replay", "--trace", &trace, "--config", &config])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let summary: Value = serde_json::from_slice(&output).expect("json summary");
    let outcomes = summary["outcomes"].as_array().expect("outcomes");
    assert_eq!(outcomes.len(), 4);
    assert_eq!(summary["swaps_done"], 1);
    assert_eq!(summary["final_assignment"]["node_list"], "hash_set");
    assert_eq!(outcomes[1]["swapped"], true);
}

#[test]
fn replay_text_output_lists_swaps() {
    let dir = TempDir::new().expect("tempdir");
    let trace = write(dir.path(), "trace.jsonl", TRACE);
    let config = write(dir.path(), "hotswap.toml", CONFIG);
    let output = cargo_bin_cmd!("graphswap")
        .args(["--theme", "plain", "replay", "--trace", &trace, "--config", &config])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).expect("utf8");
    assert!(text.contains("swap"));
    assert!(text.contains("node_list=hash_set"));
    assert!(text.contains("Summary"));
}

#[test]
fn candidates_follow_the_config() {
    let dir = TempDir::new().expect("tempdir");
    let config = write(dir.path(), "hotswap.toml", CONFIG);
    let output = cargo_bin_cmd!("graphswap")
        .args(["--format", "json", "candidates", "--config", &config])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let report: Value = serde_json::from_slice(&output).expect("json report");
    assert_eq!(report["count"], 2);
}

#[test]
fn invalid_config_fails_cleanly() {
    let dir = TempDir::new().expect("tempdir");
    let config = write(dir.path(), "bad.toml", "window_size = 0\n");
    cargo_bin_cmd!("graphswap")
        .args(["candidates", "--config", &config])
        .assert()
        .failure();
}
