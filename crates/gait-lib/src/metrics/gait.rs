use crate::{
    classify::Direction,
    detectors::gait::{build_reference, heel_strikes, DetectorConfig, GaitEvent, Reference},
    findings::Category,
    metrics::quality::DataQuality,
    signal::{
        bandpass, detrend, integrate, mean, pearson, std_dev, Axis, Recording, UniformTrace,
        GRAVITY,
    },
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// The six reported gait metrics, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Cadence,
    Velocity,
    StrideLength,
    GaitSymmetry,
    StabilityScore,
    StepRegularity,
}

impl MetricKind {
    pub const ALL: [MetricKind; 6] = [
        MetricKind::Cadence,
        MetricKind::Velocity,
        MetricKind::StrideLength,
        MetricKind::GaitSymmetry,
        MetricKind::StabilityScore,
        MetricKind::StepRegularity,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MetricKind::Cadence => "cadence",
            MetricKind::Velocity => "velocity",
            MetricKind::StrideLength => "stride_length",
            MetricKind::GaitSymmetry => "gait_symmetry",
            MetricKind::StabilityScore => "stability_score",
            MetricKind::StepRegularity => "step_regularity",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            MetricKind::Cadence => "steps/min",
            MetricKind::Velocity => "m/s",
            MetricKind::StrideLength => "m",
            _ => "score",
        }
    }

    pub fn direction(self) -> Direction {
        Direction::HigherIsBetter
    }

    pub fn category(self) -> Category {
        match self {
            MetricKind::Cadence | MetricKind::Velocity => Category::SpeedAndRhythm,
            MetricKind::GaitSymmetry | MetricKind::StabilityScore => Category::BalanceAndSymmetry,
            MetricKind::StrideLength | MetricKind::StepRegularity => Category::GaitPattern,
        }
    }

    /// Decimal places used when reporting values and ranges.
    pub fn decimals(self) -> usize {
        match self {
            MetricKind::Cadence => 1,
            _ => 2,
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MetricKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace('-', "_");
        let kind = match key.as_str() {
            "cadence" => MetricKind::Cadence,
            "velocity" | "speed" => MetricKind::Velocity,
            "stride_length" | "stride" => MetricKind::StrideLength,
            "gait_symmetry" | "symmetry" => MetricKind::GaitSymmetry,
            "stability_score" | "stability" => MetricKind::StabilityScore,
            "step_regularity" | "regularity" => MetricKind::StepRegularity,
            _ => return Err(format!("unknown metric `{s}`")),
        };
        Ok(kind)
    }
}

/// Extracted gait metrics for one recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSet {
    /// Heel strikes used for the metrics (distinct steps + 1).
    pub step_count: usize,
    pub analysis_duration_s: f64,
    pub cadence: f64,
    pub velocity: f64,
    pub stride_length: f64,
    pub gait_symmetry: f64,
    pub stability_score: f64,
    pub step_regularity: f64,
    pub vertical_oscillation: f64,
    /// Metrics that fell back to their neutral value, with the reason.
    #[serde(default)]
    pub degenerate: BTreeMap<MetricKind, String>,
}

impl MetricSet {
    /// All-zero metrics, used when no steps were found.
    pub fn zeroed(analysis_duration_s: f64) -> Self {
        Self {
            step_count: 0,
            analysis_duration_s,
            cadence: 0.0,
            velocity: 0.0,
            stride_length: 0.0,
            gait_symmetry: 0.0,
            stability_score: 0.0,
            step_regularity: 0.0,
            vertical_oscillation: 0.0,
            degenerate: BTreeMap::new(),
        }
    }

    /// Metrics built from known values, e.g. from a lab measurement.
    pub fn from_values(step_count: usize, analysis_duration_s: f64, values: [f64; 6]) -> Self {
        let mut set = Self::zeroed(analysis_duration_s);
        set.step_count = step_count;
        for (kind, value) in MetricKind::ALL.into_iter().zip(values) {
            set.set(kind, value);
        }
        set
    }

    pub fn value(&self, kind: MetricKind) -> f64 {
        match kind {
            MetricKind::Cadence => self.cadence,
            MetricKind::Velocity => self.velocity,
            MetricKind::StrideLength => self.stride_length,
            MetricKind::GaitSymmetry => self.gait_symmetry,
            MetricKind::StabilityScore => self.stability_score,
            MetricKind::StepRegularity => self.step_regularity,
        }
    }

    pub fn set(&mut self, kind: MetricKind, value: f64) {
        let slot = match kind {
            MetricKind::Cadence => &mut self.cadence,
            MetricKind::Velocity => &mut self.velocity,
            MetricKind::StrideLength => &mut self.stride_length,
            MetricKind::GaitSymmetry => &mut self.gait_symmetry,
            MetricKind::StabilityScore => &mut self.stability_score,
            MetricKind::StepRegularity => &mut self.step_regularity,
        };
        *slot = value;
    }

    pub fn is_degenerate(&self, kind: MetricKind) -> bool {
        self.degenerate.contains_key(&kind)
    }
}

/// Calibration constants for metric extraction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Accelerometer axis treated as vertical.
    pub vertical_axis: Axis,
    /// Stride length per centimetre of vertical displacement std (m/cm).
    pub stride_gain: f64,
    pub stride_min_m: f64,
    pub stride_max_m: f64,
    /// Weight applied to normalized jerk (seconds).
    pub stability_jerk_gain: f64,
    /// Weight applied to the angular jerk std (s²/deg).
    pub stability_gyro_gain: f64,
    /// Share of the stability score taken from the gyroscope; 0 disables it.
    pub stability_gyro_weight: f64,
    /// Value reported for a score that cannot be computed.
    pub neutral_score: f64,
    pub max_oscillation_m: f64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            vertical_axis: Axis::Z,
            stride_gain: 0.8,
            stride_min_m: 0.3,
            stride_max_m: 2.0,
            stability_jerk_gain: 0.04,
            stability_gyro_gain: 8e-4,
            stability_gyro_weight: 0.3,
            neutral_score: 0.5,
            max_oscillation_m: 0.2,
        }
    }
}

/// Extract metrics with default detector and extractor settings.
pub fn extract(recording: &Recording, events: &[GaitEvent], quality: DataQuality) -> MetricSet {
    extract_with_config(
        recording,
        events,
        quality,
        &DetectorConfig::default(),
        &ExtractorConfig::default(),
    )
}

/// Extract metrics from a recording and the events detected on it.
pub fn extract_with_config(
    recording: &Recording,
    events: &[GaitEvent],
    quality: DataQuality,
    detector: &DetectorConfig,
    cfg: &ExtractorConfig,
) -> MetricSet {
    let (reference, _) = build_reference(recording, detector);
    let Some(reference) = reference else {
        return MetricSet::zeroed(0.0);
    };
    let duration_s = reference.trace.duration_s();
    if events.is_empty() || !quality.is_sufficient() {
        return MetricSet::zeroed(duration_s);
    }

    let strikes = heel_strikes(events);
    let fs = reference.trace.fs;
    let high_hz = detector.highcut_hz.min(0.45 * fs);
    let mut set = MetricSet::zeroed(duration_s);
    set.step_count = strikes.len();

    if duration_s > 0.0 {
        set.cadence = strikes.len() as f64 / (duration_s / 60.0);
    } else {
        set.degenerate
            .insert(MetricKind::Cadence, "zero analysis duration".to_string());
    }

    let vertical = bandpass(
        &reference.trace.axis(cfg.vertical_axis),
        fs,
        detector.lowcut_hz,
        high_hz,
    );
    match displacement_std(&vertical, &strikes, fs) {
        Some(std_m) => {
            set.stride_length = (cfg.stride_gain * std_m * 100.0)
                .clamp(cfg.stride_min_m, cfg.stride_max_m);
            set.vertical_oscillation = std_m.clamp(0.0, cfg.max_oscillation_m);
        }
        None => {
            set.degenerate.insert(
                MetricKind::StrideLength,
                "no vertical displacement".to_string(),
            );
        }
    }

    if set.is_degenerate(MetricKind::Cadence) || set.is_degenerate(MetricKind::StrideLength) {
        set.degenerate.insert(
            MetricKind::Velocity,
            "depends on a degenerate metric".to_string(),
        );
    } else {
        set.velocity = set.stride_length * (set.cadence / 2.0) / 60.0;
    }

    match symmetry(&reference, &strikes, cfg.vertical_axis) {
        Ok(score) => set.gait_symmetry = score,
        Err(reason) => {
            set.gait_symmetry = cfg.neutral_score;
            set.degenerate.insert(MetricKind::GaitSymmetry, reason);
        }
    }

    match stability(&reference.trace, cfg) {
        Some(score) => set.stability_score = score,
        None => {
            set.stability_score = cfg.neutral_score;
            set.degenerate
                .insert(MetricKind::StabilityScore, "no acceleration change".to_string());
        }
    }

    match regularity(&strikes) {
        Ok(score) => set.step_regularity = score,
        Err(reason) => {
            set.step_regularity = cfg.neutral_score;
            set.degenerate.insert(MetricKind::StepRegularity, reason);
        }
    }

    for (kind, reason) in &set.degenerate {
        log::debug!("{kind} is degenerate: {reason}");
    }
    set
}

/// Mean std (metres) of the double-integrated vertical acceleration over two-step windows.
fn displacement_std(vertical: &[f64], strikes: &[usize], fs: f64) -> Option<f64> {
    if vertical.len() < 3 || fs <= 0.0 {
        return None;
    }
    let dt = 1.0 / fs;
    let windows: Vec<(usize, usize)> = if strikes.len() >= 3 {
        strikes
            .windows(3)
            .map(|w| (w[0], w[2].min(vertical.len() - 1)))
            .filter(|(a, b)| b > a)
            .collect()
    } else {
        vec![(0, vertical.len() - 1)]
    };
    let stds: Vec<f64> = windows
        .into_iter()
        .map(|(start, end)| {
            let velocity = detrend(&integrate(&vertical[start..=end], dt));
            let displacement = detrend(&integrate(&velocity, dt));
            std_dev(&displacement)
        })
        .filter(|s| s.is_finite())
        .collect();
    let avg = mean(&stds);
    (!stds.is_empty() && avg > 0.0).then_some(avg)
}

/// Left/right waist correlation in the stride band, where each hip swings once per stride.
///
/// The band spans a quarter to three quarters of the step frequency, which keeps the
/// stride fundamental (half the step frequency) and drops the shared step bounce.
/// Mirrored hips correlate at -1 and score 1.
fn symmetry(reference: &Reference, strikes: &[usize], axis: Axis) -> Result<f64, String> {
    let (Some(left), Some(right)) = (&reference.left_waist, &reference.right_waist) else {
        return Err("both waist sensors are required".to_string());
    };
    let (first, last) = match (strikes.first(), strikes.last()) {
        (Some(&first), Some(&last)) if last > first => (first, last),
        _ => return Err("fewer than two heel strikes".to_string()),
    };
    let interval = (last - first) as f64 / (strikes.len() - 1) as f64;
    let fs = left.fs;
    let step_hz = fs / interval;
    let (low_hz, high_hz) = (0.25 * step_hz, (0.75 * step_hz).min(0.45 * fs));
    let l = bandpass(&left.axis(axis), fs, low_hz, high_hz);
    let r = bandpass(&right.axis(axis), fs, low_hz, high_hz);
    let r = pearson(&l, &r).ok_or_else(|| "waist signals have no stride-band variance".to_string())?;
    Ok(((1.0 - r) / 2.0).clamp(0.0, 1.0))
}

/// Std of the per-second derivative of a magnitude series.
fn jerk_std(mag: &[f64], fs: f64) -> Option<f64> {
    if mag.len() < 3 {
        return None;
    }
    let jerk: Vec<f64> = mag.windows(2).map(|w| (w[1] - w[0]) * fs).collect();
    let s = std_dev(&jerk);
    (s.is_finite() && s > 0.0).then_some(s)
}

/// Smoothness blended from linear jerk and angular jerk. A flat gyroscope leaves the
/// accelerometer term alone.
fn stability(trace: &UniformTrace, cfg: &ExtractorConfig) -> Option<f64> {
    let linear = jerk_std(&trace.accel_magnitude(), trace.fs)? / GRAVITY;
    let accel_score = 1.0 / (1.0 + cfg.stability_jerk_gain * linear);
    let weight = cfg.stability_gyro_weight.clamp(0.0, 1.0);
    let score = match jerk_std(&trace.gyro_magnitude(), trace.fs) {
        Some(angular) if weight > 0.0 => {
            let gyro_score = 1.0 / (1.0 + cfg.stability_gyro_gain * angular);
            (1.0 - weight) * accel_score + weight * gyro_score
        }
        _ => accel_score,
    };
    Some(score.clamp(0.0, 1.0))
}

fn regularity(strikes: &[usize]) -> Result<f64, String> {
    let intervals: Vec<f64> = strikes
        .windows(2)
        .map(|w| w[1].saturating_sub(w[0]) as f64)
        .collect();
    if intervals.len() < 2 {
        return Err("fewer than two step intervals".to_string());
    }
    let m = mean(&intervals);
    if m <= 0.0 {
        return Err("zero mean step interval".to_string());
    }
    Ok((1.0 - std_dev(&intervals) / m).clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::gait::detect;
    use crate::signal::Placement;
    use crate::synth::{simulate, SimulationParams};

    fn metrics_for(params: SimulationParams) -> MetricSet {
        let rec = simulate(&params);
        let detection = detect(&rec, &DetectorConfig::default());
        extract(&rec, &detection.events, detection.quality)
    }

    #[test]
    fn simulated_walk_recovers_cadence() {
        let m = metrics_for(SimulationParams::default());
        assert!((m.cadence - 115.0).abs() < 5.5, "cadence {}", m.cadence);
        assert!(m.degenerate.is_empty(), "{:?}", m.degenerate);
        assert!(m.stride_length >= 0.3 && m.stride_length <= 2.0);
        let expected_velocity = m.stride_length * m.cadence / 120.0;
        assert!((m.velocity - expected_velocity).abs() < 1e-9);
        assert!(m.vertical_oscillation > 0.0 && m.vertical_oscillation <= 0.2);
    }

    #[test]
    fn symmetry_tracks_left_right_antiphase() {
        let even = metrics_for(SimulationParams::default());
        let lopsided = metrics_for(SimulationParams {
            asymmetry: 1.0,
            ..SimulationParams::default()
        });
        assert!(even.gait_symmetry > 0.75, "{}", even.gait_symmetry);
        assert!(lopsided.gait_symmetry < 0.25, "{}", lopsided.gait_symmetry);
    }

    #[test]
    fn noise_lowers_stability() {
        let clean = metrics_for(SimulationParams {
            noise: 0.05,
            ..SimulationParams::default()
        });
        let noisy = metrics_for(SimulationParams {
            noise: 1.0,
            ..SimulationParams::default()
        });
        assert!(clean.stability_score > noisy.stability_score);
    }

    #[test]
    fn simulated_walk_lands_near_reference_cohort() {
        let m = metrics_for(SimulationParams::default());
        assert!((1.2..=1.6).contains(&m.stride_length), "stride {}", m.stride_length);
        assert!((1.2..=1.6).contains(&m.velocity), "velocity {}", m.velocity);
        assert!(m.gait_symmetry > 0.9, "symmetry {}", m.gait_symmetry);
        assert!((0.8..=0.95).contains(&m.stability_score), "stability {}", m.stability_score);
    }

    #[test]
    fn symmetry_ignores_shared_step_bounce() {
        // The right hip loses its stride sway, so the sides stop mirroring.
        let m = metrics_for(SimulationParams {
            asymmetry: 0.5,
            ..SimulationParams::default()
        });
        assert!((0.3..=0.7).contains(&m.gait_symmetry), "{}", m.gait_symmetry);
    }

    #[test]
    fn gyro_noise_lowers_stability() {
        let steady = metrics_for(SimulationParams::default());
        let shaky = metrics_for(SimulationParams {
            gyro_noise: 30.0,
            ..SimulationParams::default()
        });
        assert!(
            steady.stability_score - shaky.stability_score > 0.05,
            "{} vs {}",
            steady.stability_score,
            shaky.stability_score
        );
    }

    #[test]
    fn flat_gyro_leaves_accelerometer_stability() {
        let mut rec = simulate(&SimulationParams::default());
        for samples in rec.sensors.values_mut() {
            for s in samples.iter_mut() {
                (s.gx, s.gy, s.gz) = (0.0, 0.0, 0.0);
            }
        }
        let detection = detect(&rec, &DetectorConfig::default());
        let run = |cfg: &ExtractorConfig| {
            extract_with_config(
                &rec,
                &detection.events,
                detection.quality,
                &DetectorConfig::default(),
                cfg,
            )
            .stability_score
        };
        let accel_only = ExtractorConfig {
            stability_gyro_weight: 0.0,
            ..ExtractorConfig::default()
        };
        assert!((run(&ExtractorConfig::default()) - run(&accel_only)).abs() < 1e-12);
    }

    #[test]
    fn irregular_steps_lower_regularity() {
        let regular = metrics_for(SimulationParams::default());
        let irregular = metrics_for(SimulationParams {
            irregularity: 0.25,
            ..SimulationParams::default()
        });
        assert!(regular.step_regularity > 0.9, "{}", regular.step_regularity);
        assert!(regular.step_regularity - irregular.step_regularity > 0.03);
    }

    #[test]
    fn single_waist_marks_symmetry_degenerate() {
        let mut rec = simulate(&SimulationParams::default());
        rec.sensors.remove(&Placement::RightWaist);
        let detection = detect(&rec, &DetectorConfig::default());
        let m = extract(&rec, &detection.events, detection.quality);
        assert!(m.is_degenerate(MetricKind::GaitSymmetry));
        assert_eq!(m.gait_symmetry, ExtractorConfig::default().neutral_score);
        assert!(!m.is_degenerate(MetricKind::Cadence));
    }

    #[test]
    fn no_events_gives_zeroed_metrics() {
        let rec = simulate(&SimulationParams::default());
        let m = extract(&rec, &[], DataQuality::Excellent);
        assert_eq!(m.step_count, 0);
        assert!(MetricKind::ALL.iter().all(|k| m.value(*k) == 0.0));
        assert!(m.degenerate.is_empty());
        assert_eq!(extract(&Recording::new(), &[], DataQuality::Fair).step_count, 0);
    }

    #[test]
    fn metric_names_parse_with_aliases() {
        assert_eq!("stability".parse::<MetricKind>(), Ok(MetricKind::StabilityScore));
        assert_eq!("Stride-Length".parse::<MetricKind>(), Ok(MetricKind::StrideLength));
        assert!("tempo".parse::<MetricKind>().is_err());
        for kind in MetricKind::ALL {
            assert_eq!(kind.name().parse::<MetricKind>(), Ok(kind));
        }
    }
}
