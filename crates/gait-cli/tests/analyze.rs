use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use std::{error::Error, fs};
use tempfile::tempdir;

fn simulated(args: &[&str]) -> Result<Vec<u8>, Box<dyn Error>> {
    let mut cmd = cargo_bin_cmd!("gait");
    cmd.arg("simulate").args(args);
    Ok(cmd.assert().success().get_output().stdout.clone())
}

#[test]
fn simulate_then_analyze_round_trips() -> Result<(), Box<dyn Error>> {
    let recording = simulated(&["--seconds", "40", "--seed", "3"])?;

    let mut cmd = cargo_bin_cmd!("gait");
    cmd.arg("analyze").write_stdin(recording);
    let output = cmd.assert().success().get_output().stdout.clone();
    let result: Value = serde_json::from_slice(&output)?;

    assert_eq!(result["quality"], "excellent");
    assert_eq!(result["outcomes"].as_array().map(Vec::len), Some(6));
    assert!(result["summary"]["overall_status"].is_string());
    let cadence = result["metrics"]["cadence"].as_f64().unwrap_or_default();
    assert!((cadence - 115.0).abs() < 5.5, "cadence {cadence}");
    assert_eq!(result["sensor_health"]["total_sensors"], 12);
    assert_ne!(result["summary"]["overall_status"], "needs_immediate_attention");
    let findings = result["findings"].as_array().cloned().unwrap_or_default();
    assert!(findings.iter().all(|f| f["severity"] != "severe"), "{findings:?}");
    Ok(())
}

#[test]
fn analyze_reads_files_and_config() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let input = dir.path().join("walk.json");
    fs::write(&input, simulated(&["--no-pressure"])?)?;
    let config = dir.path().join("engine.toml");
    fs::write(&config, "[detector]\nstance_fraction = 0.5\n")?;

    let mut cmd = cargo_bin_cmd!("gait");
    cmd.args([
        "detect",
        "--input",
        input.to_str().expect("utf8 path"),
        "--config",
        config.to_str().expect("utf8 path"),
    ]);
    let output = cmd.assert().success().get_output().stdout.clone();
    let detection: Value = serde_json::from_slice(&output)?;
    let events = detection["events"].as_array().cloned().unwrap_or_default();
    assert!(!events.is_empty());
    let (mut stance, mut total) = (0u64, 0u64);
    for event in &events {
        let duration = event["duration"].as_u64().unwrap_or_default();
        total += duration;
        if event["phase"] == "stance" {
            stance += duration;
        }
    }
    let fraction = stance as f64 / total as f64;
    assert!((fraction - 0.5).abs() < 0.03, "stance fraction {fraction}");
    Ok(())
}

#[test]
fn short_recording_reports_insufficient_data() -> Result<(), Box<dyn Error>> {
    let recording = simulated(&["--seconds", "4"])?;
    let mut cmd = cargo_bin_cmd!("gait");
    cmd.arg("analyze").write_stdin(recording);
    let output = cmd.assert().success().get_output().stdout.clone();
    let result: Value = serde_json::from_slice(&output)?;
    assert_eq!(result["quality"], "insufficient_data");
    assert!(result["summary"].is_null());
    assert_eq!(result["findings"].as_array().map(Vec::len), Some(0));
    assert_eq!(result["issues"][0]["kind"], "insufficient_data");
    Ok(())
}

#[test]
fn invalid_json_fails_with_context() {
    let mut cmd = cargo_bin_cmd!("gait");
    cmd.arg("analyze").write_stdin("{not json");
    let output = cmd.assert().failure().get_output().stderr.clone();
    assert!(String::from_utf8_lossy(&output).contains("not valid JSON"));
}

#[test]
fn unreadable_stdin_names_the_source() {
    let mut cmd = cargo_bin_cmd!("gait");
    cmd.arg("analyze").write_stdin(vec![0xff, 0xfe, 0x00, 0x7b]);
    let output = cmd.assert().failure().get_output().stderr.clone();
    assert!(String::from_utf8_lossy(&output).contains("failed to read recording from stdin"));
}
