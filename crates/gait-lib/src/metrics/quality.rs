use crate::signal::{validate_samples, FootZone, Placement, Recording};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Data-quality tier of a recording, worst first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataQuality {
    InsufficientData,
    Fair,
    Good,
    Excellent,
}

impl DataQuality {
    pub fn is_sufficient(self) -> bool {
        self != DataQuality::InsufficientData
    }
}

/// Tier by analysis duration (seconds) and accepted heel-strike count.
pub fn classify_quality(duration_s: f64, heel_strikes: usize) -> DataQuality {
    if duration_s >= 30.0 && heel_strikes >= 20 {
        DataQuality::Excellent
    } else if duration_s >= 15.0 && heel_strikes >= 10 {
        DataQuality::Good
    } else if duration_s >= 10.0 && heel_strikes >= 5 {
        DataQuality::Fair
    } else {
        DataQuality::InsufficientData
    }
}

/// Cap a sufficient tier at `Fair` when the cadence falls outside `[low, high]` steps/min.
pub fn cap_for_cadence(quality: DataQuality, cadence_spm: f64, plausible: [f64; 2]) -> DataQuality {
    let [low, high] = plausible;
    if quality > DataQuality::Fair && !(low..=high).contains(&cadence_spm) {
        DataQuality::Fair
    } else {
        quality
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorStatus {
    Working,
    Degraded,
    Failed,
}

/// Per-sensor availability report for one recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorHealth {
    pub working_count: usize,
    pub total_sensors: usize,
    pub sensor_status: BTreeMap<String, SensorStatus>,
    pub warnings: Vec<String>,
    pub critical_failures: Vec<String>,
}

impl SensorHealth {
    pub fn status(&self, name: &str) -> Option<SensorStatus> {
        self.sensor_status.get(name).copied()
    }
}

/// A stream with more than this many samples counts as working.
const WORKING_MIN_SAMPLES: usize = 10;

pub fn check_sensor_health(recording: &Recording) -> SensorHealth {
    let mut health = SensorHealth {
        working_count: 0,
        total_sensors: Placement::ALL.len() + FootZone::ALL.len(),
        sensor_status: BTreeMap::new(),
        warnings: Vec::new(),
        critical_failures: Vec::new(),
    };

    for placement in Placement::ALL {
        let name = placement.name();
        let samples = recording.samples(placement);
        let status = if samples.is_empty() {
            health.warnings.push(format!("{name} is not responding"));
            SensorStatus::Failed
        } else if let Err(reason) = validate_samples(samples) {
            health.warnings.push(format!("{name} is malformed: {reason}"));
            SensorStatus::Degraded
        } else if samples.len() > WORKING_MIN_SAMPLES {
            SensorStatus::Working
        } else {
            health
                .warnings
                .push(format!("{name} has low data ({} samples)", samples.len()));
            SensorStatus::Degraded
        };
        if status == SensorStatus::Working {
            health.working_count += 1;
        }
        health.sensor_status.insert(name.to_string(), status);
    }

    if recording.pressure.is_empty() {
        health
            .warnings
            .push("No pressure sensor data available".to_string());
    } else {
        for zone in FootZone::ALL {
            let name = format!("FSR_{}", zone.name());
            let len = recording.pressure(zone).map_or(0, |t| t.len());
            let status = match len {
                0 => {
                    health.warnings.push(format!("{name} is not responding"));
                    SensorStatus::Failed
                }
                n if n > WORKING_MIN_SAMPLES => SensorStatus::Working,
                n => {
                    health.warnings.push(format!("{name} has low data ({n} samples)"));
                    SensorStatus::Degraded
                }
            };
            if status == SensorStatus::Working {
                health.working_count += 1;
            }
            health.sensor_status.insert(name, status);
        }
    }

    let waist_failed = |p: Placement| health.status(p.name()) == Some(SensorStatus::Failed);
    if waist_failed(Placement::LeftWaist) && waist_failed(Placement::RightWaist) {
        health
            .critical_failures
            .push("Both waist sensors failed - cannot perform analysis".to_string());
    }
    if health.warnings.len() > health.total_sensors / 2 {
        health.critical_failures.push(
            "More than half of sensors are malfunctioning - check hardware connections"
                .to_string(),
        );
    }
    health
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{PressureTrace, SensorSample};

    #[test]
    fn quality_tiers_follow_duration_and_steps() {
        assert_eq!(classify_quality(45.0, 60), DataQuality::Excellent);
        assert_eq!(classify_quality(45.0, 12), DataQuality::Good);
        assert_eq!(classify_quality(20.0, 30), DataQuality::Good);
        assert_eq!(classify_quality(12.0, 30), DataQuality::Fair);
        assert_eq!(classify_quality(12.0, 4), DataQuality::InsufficientData);
        assert_eq!(classify_quality(9.9, 30), DataQuality::InsufficientData);
    }

    #[test]
    fn implausible_cadence_caps_quality_at_fair() {
        let band = [60.0, 150.0];
        assert_eq!(cap_for_cadence(DataQuality::Excellent, 40.0, band), DataQuality::Fair);
        assert_eq!(cap_for_cadence(DataQuality::Good, 170.0, band), DataQuality::Fair);
        assert_eq!(cap_for_cadence(DataQuality::Excellent, 110.0, band), DataQuality::Excellent);
        assert_eq!(cap_for_cadence(DataQuality::Fair, 30.0, band), DataQuality::Fair);
        assert_eq!(
            cap_for_cadence(DataQuality::InsufficientData, 30.0, band),
            DataQuality::InsufficientData
        );
        assert_eq!(cap_for_cadence(DataQuality::Good, f64::NAN, band), DataQuality::Fair);
    }

    #[test]
    fn health_flags_missing_waists_as_critical() {
        let samples: Vec<SensorSample> = (0..20)
            .map(|i| SensorSample::new(i * 20, [0.0, 0.0, 9.8], [0.0; 3]))
            .collect();
        let rec = Recording::new()
            .with_placement(Placement::LeftKnee, samples.clone())
            .with_placement(Placement::RightKnee, samples[..5].to_vec())
            .with_pressure(FootZone::LeftHeel, PressureTrace::new(vec![3.0; 20]));
        let health = check_sensor_health(&rec);
        assert_eq!(health.status("LEFT_KNEE"), Some(SensorStatus::Working));
        assert_eq!(health.status("RIGHT_KNEE"), Some(SensorStatus::Degraded));
        assert_eq!(health.status("LEFT_WAIST"), Some(SensorStatus::Failed));
        assert_eq!(health.status("FSR_LEFT_HEEL"), Some(SensorStatus::Working));
        assert_eq!(health.working_count, 2);
        assert!(health
            .critical_failures
            .iter()
            .any(|f| f.contains("Both waist sensors failed")));
    }
}
