use crate::{
    issues::AnalysisIssue,
    metrics::quality::{cap_for_cadence, classify_quality, DataQuality},
    signal::{
        bandpass, mean, resample, span_s, std_dev, validate_samples, FootZone, Placement,
        PressureTrace, Recording, Side, UniformTrace,
    },
};
use serde::{Deserialize, Serialize};

/// Which direction of a pressure reading means the foot is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadPolarity {
    /// Readings above the threshold are contact (force sensors).
    Rising,
    /// Readings below the threshold are contact (voltage-divider FSRs).
    Falling,
}

/// Heel contact interpretation for pressure traces.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PressureConfig {
    pub contact_threshold: f64,
    pub polarity: LoadPolarity,
    /// Traces with a smaller peak-to-peak range are treated as flat.
    pub min_range: f64,
}

impl Default for PressureConfig {
    fn default() -> Self {
        Self {
            contact_threshold: 1.5,
            polarity: LoadPolarity::Falling,
            min_range: 0.05,
        }
    }
}

impl PressureConfig {
    pub fn is_loaded(&self, value: f64) -> bool {
        match self.polarity {
            LoadPolarity::Rising => value > self.contact_threshold,
            LoadPolarity::Falling => value < self.contact_threshold,
        }
    }
}

/// Configurable parameters for heel-strike detection and step segmentation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Minimum samples on a placement for it to be used.
    pub min_samples: usize,
    /// Minimum span (seconds) on a placement for it to be used.
    pub min_duration_s: f64,
    /// Band-pass edges applied to the acceleration magnitude (Hz).
    pub lowcut_hz: f64,
    pub highcut_hz: f64,
    /// Peaks must exceed `mean + threshold_scale * std` of the filtered signal.
    pub threshold_scale: f64,
    /// Fastest plausible cadence; sets the minimum spacing between heel strikes.
    pub max_cadence_spm: f64,
    /// Stance share of a step when pressure cannot locate toe-off.
    pub stance_fraction: f64,
    /// Cap quality at fair when the detected cadence leaves `plausible_cadence_spm`.
    pub cap_implausible_cadence: bool,
    pub plausible_cadence_spm: [f64; 2],
    pub pressure: PressureConfig,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_samples: 50,
            min_duration_s: 10.0,
            lowcut_hz: 0.5,
            highcut_hz: 3.0,
            threshold_scale: 0.5,
            max_cadence_spm: 150.0,
            stance_fraction: 0.6,
            cap_implausible_cadence: true,
            plausible_cadence_spm: [60.0, 150.0],
            pressure: PressureConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GaitPhase {
    Stance,
    Swing,
}

/// One stance or swing interval, in reference-grid sample indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GaitEvent {
    pub side: Side,
    pub step_index: usize,
    pub phase: GaitPhase,
    pub start: usize,
    pub end: usize,
    pub duration: usize,
}

impl GaitEvent {
    fn new(side: Side, step_index: usize, phase: GaitPhase, start: usize, end: usize) -> Self {
        Self {
            side,
            step_index,
            phase,
            start,
            end,
            duration: end.saturating_sub(start),
        }
    }
}

/// Result of heel-strike detection on a recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub quality: DataQuality,
    pub duration_s: f64,
    pub fs: f64,
    pub heel_strikes: usize,
    pub events: Vec<GaitEvent>,
    pub issues: Vec<AnalysisIssue>,
}

/// Placements resampled onto the grid of the primary reference placement.
#[derive(Debug, Clone)]
pub(crate) struct Reference {
    pub trace: UniformTrace,
    pub left_waist: Option<UniformTrace>,
    pub right_waist: Option<UniformTrace>,
}

/// Screen placements and assemble the reference trace.
///
/// Returns `None` when no placement has enough samples over a long enough span.
pub(crate) fn build_reference(
    recording: &Recording,
    cfg: &DetectorConfig,
) -> (Option<Reference>, Vec<AnalysisIssue>) {
    let mut issues = Vec::new();
    let mut eligible = Vec::new();
    for placement in Placement::ALL {
        let samples = recording.samples(placement);
        if samples.is_empty() {
            continue;
        }
        if let Err(reason) = validate_samples(samples) {
            log::warn!("excluding {}: {reason}", placement.name());
            issues.push(AnalysisIssue::MalformedRecording { placement, reason });
            continue;
        }
        let span = span_s(samples);
        if samples.len() >= cfg.min_samples.max(2) && span > 0.0 && span >= cfg.min_duration_s {
            eligible.push(placement);
        }
    }

    let Some(&primary) = eligible.first() else {
        return (None, issues);
    };
    let primary_samples = recording.samples(primary);
    let n = primary_samples.len();
    let t0_ms = primary_samples[0].timestamp_ms as f64;
    let fs = (n - 1) as f64 / span_s(primary_samples);
    let grid = |p: Placement| resample(recording.samples(p), t0_ms, fs, n);

    let left_waist = eligible
        .contains(&Placement::LeftWaist)
        .then(|| grid(Placement::LeftWaist));
    let right_waist = eligible
        .contains(&Placement::RightWaist)
        .then(|| grid(Placement::RightWaist));

    let trace = match (&left_waist, &right_waist) {
        (Some(l), Some(r)) => average(l, r),
        _ => grid(primary),
    };
    log::debug!(
        "reference {} at {fs:.1} Hz over {n} samples",
        primary.name()
    );
    (
        Some(Reference {
            trace,
            left_waist,
            right_waist,
        }),
        issues,
    )
}

fn average(a: &UniformTrace, b: &UniformTrace) -> UniformTrace {
    let mid = |x: &[f64; 3], y: &[f64; 3]| {
        [
            0.5 * (x[0] + y[0]),
            0.5 * (x[1] + y[1]),
            0.5 * (x[2] + y[2]),
        ]
    };
    UniformTrace {
        fs: a.fs,
        accel: a.accel.iter().zip(&b.accel).map(|(x, y)| mid(x, y)).collect(),
        gyro: a.gyro.iter().zip(&b.gyro).map(|(x, y)| mid(x, y)).collect(),
    }
}

/// Detect heel strikes and segment steps into stance and swing.
pub fn detect(recording: &Recording, cfg: &DetectorConfig) -> Detection {
    let (reference, mut issues) = build_reference(recording, cfg);
    let Some(reference) = reference else {
        let duration_s = recording.duration_s();
        log::warn!("no placement is long enough for analysis");
        issues.push(AnalysisIssue::InsufficientData {
            duration_s,
            heel_strikes: 0,
        });
        return Detection {
            quality: DataQuality::InsufficientData,
            duration_s,
            fs: 0.0,
            heel_strikes: 0,
            events: Vec::new(),
            issues,
        };
    };

    let trace = &reference.trace;
    let fs = trace.fs;
    let duration_s = trace.duration_s();
    let high_hz = cfg.highcut_hz.min(0.45 * fs);
    let filtered = bandpass(&trace.accel_magnitude(), fs, cfg.lowcut_hz, high_hz);
    let strikes = pick_heel_strikes(&filtered, fs, cfg);
    let mut quality = classify_quality(duration_s, strikes.len());
    if cfg.cap_implausible_cadence && duration_s > 0.0 {
        let cadence = strikes.len() as f64 * 60.0 / duration_s;
        let capped = cap_for_cadence(quality, cadence, cfg.plausible_cadence_spm);
        if capped != quality {
            log::warn!("cadence {cadence:.1} steps/min is implausible; quality capped at fair");
            quality = capped;
        }
    }
    log::info!(
        "{} heel strikes over {duration_s:.1}s ({quality:?})",
        strikes.len()
    );

    let events = if quality.is_sufficient() {
        segment_steps(&strikes, recording, cfg)
    } else {
        log::warn!("insufficient data for gait analysis");
        issues.push(AnalysisIssue::InsufficientData {
            duration_s,
            heel_strikes: strikes.len(),
        });
        Vec::new()
    };

    Detection {
        quality,
        duration_s,
        fs,
        heel_strikes: strikes.len(),
        events,
        issues,
    }
}

fn pick_heel_strikes(filtered: &[f64], fs: f64, cfg: &DetectorConfig) -> Vec<usize> {
    if filtered.len() < 3 {
        return Vec::new();
    }
    let threshold = mean(filtered) + cfg.threshold_scale * std_dev(filtered);
    let min_gap = ((60.0 / cfg.max_cadence_spm) * fs).round().max(1.0) as usize;

    let mut peaks: Vec<usize> = Vec::new();
    for i in 1..filtered.len() - 1 {
        let y = filtered[i];
        if y <= threshold || y <= filtered[i - 1] || y < filtered[i + 1] {
            continue;
        }
        match peaks.last_mut() {
            Some(last) if i - *last < min_gap => {
                if y > filtered[*last] {
                    *last = i;
                }
            }
            _ => peaks.push(i),
        }
    }
    peaks
}

fn segment_steps(strikes: &[usize], recording: &Recording, cfg: &DetectorConfig) -> Vec<GaitEvent> {
    let heels = [Side::Left, Side::Right].map(|side| {
        recording
            .pressure(FootZone::heel(side))
            .filter(|trace| usable_pressure(trace, cfg))
    });
    let heel = |side: Side| match side {
        Side::Left => heels[0],
        Side::Right => heels[1],
    };

    let mut events = Vec::with_capacity(strikes.len().saturating_sub(1) * 2);
    let mut previous: Option<Side> = None;
    let mut fallbacks = 0usize;
    for (step_index, w) in strikes.windows(2).enumerate() {
        let (start, end) = (w[0], w[1]);
        let onset_end = start + ((end - start) / 10).max(2);
        let side = loaded_side(heels, start, onset_end, cfg)
            .unwrap_or_else(|| previous.map_or(Side::Left, Side::opposite));
        previous = Some(side);

        let toe_off = heel(side)
            .and_then(|trace| find_toe_off(trace, start, onset_end, end, cfg))
            .unwrap_or_else(|| {
                fallbacks += 1;
                start + ((end - start) as f64 * cfg.stance_fraction).round() as usize
            });

        events.push(GaitEvent::new(side, step_index, GaitPhase::Stance, start, toe_off));
        if toe_off < end {
            events.push(GaitEvent::new(side, step_index, GaitPhase::Swing, toe_off, end));
        }
    }
    if fallbacks > 0 {
        log::debug!("{fallbacks} steps used the fixed stance fraction");
    }
    events
}

fn usable_pressure(trace: &PressureTrace, cfg: &DetectorConfig) -> bool {
    trace.len() >= 2
        && trace.values.iter().all(|v| v.is_finite())
        && trace.range() >= cfg.pressure.min_range
}

/// The foot whose heel is loaded for more samples of the onset window.
fn loaded_side(
    heels: [Option<&PressureTrace>; 2],
    start: usize,
    onset_end: usize,
    cfg: &DetectorConfig,
) -> Option<Side> {
    let count = |trace: Option<&PressureTrace>| {
        trace.map_or(0, |t| {
            (start..=onset_end)
                .filter_map(|i| t.values.get(i))
                .filter(|&&v| cfg.pressure.is_loaded(v))
                .count()
        })
    };
    let (left, right) = (count(heels[0]), count(heels[1]));
    match left.cmp(&right) {
        std::cmp::Ordering::Greater => Some(Side::Left),
        std::cmp::Ordering::Less => Some(Side::Right),
        std::cmp::Ordering::Equal => None,
    }
}

/// First unloaded sample after heel contact inside `(start, end)`.
fn find_toe_off(
    trace: &PressureTrace,
    start: usize,
    onset_end: usize,
    end: usize,
    cfg: &DetectorConfig,
) -> Option<usize> {
    let loaded = |i: usize| trace.values.get(i).is_some_and(|&v| cfg.pressure.is_loaded(v));
    let contact = (start..=onset_end.min(end)).find(|&i| loaded(i))?;
    (contact + 1..end).find(|&i| trace.values.get(i).is_some() && !loaded(i))
}

/// Heel-strike indices implied by a step event list: each stance start plus the final step end.
pub fn heel_strikes(events: &[GaitEvent]) -> Vec<usize> {
    let mut strikes: Vec<usize> = events
        .iter()
        .filter(|e| e.phase == GaitPhase::Stance)
        .map(|e| e.start)
        .collect();
    if let Some(end) = events.iter().map(|e| e.end).max() {
        strikes.push(end);
    }
    strikes
}
