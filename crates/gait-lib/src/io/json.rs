use crate::{baseline::BaselineTable, signal::Recording};
use anyhow::{Context, Result};
use std::path::Path;

/// Parse a firmware recording (`sensor_data` / `fsr_data` keys, or `sensors` / `pressure`).
pub fn parse_recording(text: &str) -> Result<Recording> {
    let recording: Recording =
        serde_json::from_str(text).context("recording is not valid JSON")?;
    if recording.sensors.is_empty() {
        log::warn!("recording has no inertial placements");
    }
    Ok(recording)
}

pub fn read_recording(path: &Path) -> Result<Recording> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_recording(&text).with_context(|| format!("parsing recording {}", path.display()))
}

/// Parse a `metric name -> statistics` baseline map. Invalid entries are dropped.
pub fn parse_baseline(text: &str) -> Result<BaselineTable> {
    let table: BaselineTable = serde_json::from_str(text).context("baseline is not valid JSON")?;
    if table.is_empty() {
        anyhow::bail!("baseline has no usable entries");
    }
    Ok(table)
}

pub fn read_baseline(path: &Path) -> Result<BaselineTable> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_baseline(&text).with_context(|| format!("parsing baseline {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Placement;
    use std::io::Write;

    #[test]
    fn reads_recording_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"sensors": {{"RIGHT_KNEE": [{{"timestamp": 5, "ax": 0, "ay": 0, "az": 9.8, "gx": 1}}]}}}}"#
        )
        .unwrap();
        let rec = read_recording(file.path()).unwrap();
        assert_eq!(rec.samples(Placement::RightKnee)[0].gx, 1.0);
        assert!(rec.pressure.is_empty());
    }

    #[test]
    fn rejects_malformed_json() {
        let err = parse_recording("{\"sensor_data\": [").unwrap_err();
        assert!(err.to_string().contains("not valid JSON"));
    }

    #[test]
    fn empty_baseline_is_an_error() {
        assert!(parse_baseline(r#"{"tempo": {"mean": 1, "std": 1, "p5": 1, "p25": 1, "p75": 1, "p95": 1, "min": 1, "max": 1}}"#).is_err());
        let table = parse_baseline(&serde_json::to_string(&BaselineTable::reference_cohort()).unwrap()).unwrap();
        assert_eq!(table.len(), 6);
    }
}
