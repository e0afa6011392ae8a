use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use std::{error::Error, fs};
use tempfile::tempdir;

fn classify(args: &[&str]) -> Result<Value, Box<dyn Error>> {
    let mut cmd = cargo_bin_cmd!("gait");
    cmd.arg("classify").args(args);
    let output = cmd.assert().success().get_output().stdout.clone();
    Ok(serde_json::from_slice(&output)?)
}

#[test]
fn classifies_against_reference_cohort() -> Result<(), Box<dyn Error>> {
    let out = classify(&["--metric", "velocity", "--value", "1.25"])?;
    assert_eq!(out["percentile"], 22);
    assert_eq!(out["severity"], "moderate");

    let out = classify(&["--metric", "stability", "--value", "0.45"])?;
    assert_eq!(out["metric"], "stability_score");
    assert_eq!(out["percentile"], 1);
    assert_eq!(out["severity"], "severe");
    Ok(())
}

#[test]
fn custom_baseline_is_used() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("baseline.json");
    fs::write(
        &path,
        r#"{"cadence": {"mean": 100, "std": 10, "p5": 83.6, "p25": 93.3, "p75": 106.7, "p95": 116.4, "min": 80, "max": 120}}"#,
    )?;
    let out = classify(&[
        "--metric",
        "cadence",
        "--value",
        "100",
        "--baseline",
        path.to_str().expect("utf8 path"),
    ])?;
    assert_eq!(out["percentile"], 50);
    assert_eq!(out["severity"], "none");

    let mut cmd = cargo_bin_cmd!("gait");
    cmd.args([
        "classify",
        "--metric",
        "velocity",
        "--value",
        "1.0",
        "--baseline",
        path.to_str().expect("utf8 path"),
    ]);
    cmd.assert().failure();
    Ok(())
}

#[test]
fn baseline_command_prints_all_metrics() -> Result<(), Box<dyn Error>> {
    let mut cmd = cargo_bin_cmd!("gait");
    cmd.arg("baseline");
    let output = cmd.assert().success().get_output().stdout.clone();
    let table: Value = serde_json::from_slice(&output)?;
    let names: Vec<&str> = table
        .as_object()
        .map(|m| m.keys().map(String::as_str).collect())
        .unwrap_or_default();
    assert_eq!(names.len(), 6);
    assert!(names.contains(&"step_regularity"));
    Ok(())
}

#[test]
fn unknown_metric_is_rejected() {
    let mut cmd = cargo_bin_cmd!("gait");
    cmd.args(["classify", "--metric", "tempo", "--value", "1"]);
    cmd.assert().failure();
}
