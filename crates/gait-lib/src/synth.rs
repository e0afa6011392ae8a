//! Seeded synthetic walking recordings for demos and tests.

use crate::signal::{FootZone, Placement, PressureTrace, Recording, SensorSample, Side, GRAVITY};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::PI;

/// Heel reading (V) while the foot is loaded and unloaded; voltage drops under pressure.
const FSR_LOADED_V: f64 = 0.5;
const FSR_UNLOADED_V: f64 = 3.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParams {
    pub duration_s: f64,
    /// Nominal sample rate (Hz).
    pub fs: f64,
    pub cadence_spm: f64,
    /// Peak vertical excursion of the centre of mass per step (m).
    pub vertical_excursion_m: f64,
    /// Left/right alternating waist acceleration at stride frequency (m/s²).
    pub stride_amplitude: f64,
    /// Per-axis accelerometer noise standard deviation (m/s²).
    pub noise: f64,
    /// Per-axis gyroscope noise standard deviation (deg/s).
    pub gyro_noise: f64,
    /// Relative spread of step durations, 0 for a metronome gait.
    pub irregularity: f64,
    /// 0 mirrors the right waist against the left, 1 makes both sides identical.
    pub asymmetry: f64,
    pub timestamp_jitter_ms: u64,
    pub with_pressure: bool,
    pub seed: u64,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            duration_s: 40.0,
            fs: 50.0,
            cadence_spm: 115.0,
            vertical_excursion_m: 0.025,
            stride_amplitude: 1.0,
            noise: 0.1,
            gyro_noise: 0.1,
            irregularity: 0.0,
            asymmetry: 0.0,
            timestamp_jitter_ms: 2,
            with_pressure: true,
            seed: 7,
        }
    }
}

/// Step onset times (seconds) covering `[0, duration_s]`.
fn step_onsets(params: &SimulationParams, rng: &mut StdRng) -> Vec<f64> {
    let period = 60.0 / params.cadence_spm.max(1.0);
    let mut onsets = vec![0.0];
    let mut t = 0.0;
    while t <= params.duration_s + period {
        let spread = if params.irregularity > 0.0 {
            params.irregularity * rng.gen_range(-1.0..=1.0)
        } else {
            0.0
        };
        t += period * (1.0 + spread).max(0.2);
        onsets.push(t);
    }
    onsets
}

/// Step index and phase within that step (0..1) at time `t`.
fn step_phase(onsets: &[f64], t: f64) -> (usize, f64) {
    let k = onsets
        .partition_point(|&onset| onset <= t)
        .saturating_sub(1)
        .min(onsets.len().saturating_sub(2));
    let (start, end) = (onsets[k], onsets[k + 1]);
    (k, ((t - start) / (end - start)).clamp(0.0, 1.0))
}

fn foot_of_step(k: usize) -> Side {
    if k % 2 == 0 {
        Side::Left
    } else {
        Side::Right
    }
}

struct Noise {
    rng: StdRng,
}

impl Noise {
    /// Uniform noise with standard deviation `scale`. Always draws, so the
    /// stream stays aligned when a scale is zero.
    fn sample(&mut self, scale: f64) -> f64 {
        let u: f64 = self.rng.gen_range(-1.0..=1.0);
        scale.max(0.0) * 3f64.sqrt() * u
    }

    fn vec3(&mut self, scale: f64) -> [f64; 3] {
        [self.sample(scale), self.sample(scale), self.sample(scale)]
    }
}

/// Vertical acceleration amplitude that moves the centre of mass by the configured excursion.
fn step_amplitude(params: &SimulationParams) -> f64 {
    let omega = 2.0 * PI * params.cadence_spm.max(1.0) / 60.0;
    params.vertical_excursion_m * omega * omega
}

fn inertial(placement: Placement, params: &SimulationParams, k: usize, local: f64) -> ([f64; 3], [f64; 3]) {
    let step = 2.0 * PI * local;
    let stride = PI * (k as f64 + local);
    let a = step_amplitude(params);
    let sign = match placement.side() {
        Side::Left => 1.0,
        Side::Right => -(1.0 - 2.0 * params.asymmetry.clamp(0.0, 1.0)),
    };
    let own = foot_of_step(k) == placement.side();
    match placement {
        Placement::LeftWaist | Placement::RightWaist => (
            [
                0.3 * sign * stride.sin(),
                0.5 * step.sin(),
                GRAVITY + a * step.cos() + sign * params.stride_amplitude * stride.cos(),
            ],
            [5.0 * sign * stride.sin(), 0.0, 20.0 * step.sin()],
        ),
        Placement::LeftKnee | Placement::RightKnee => (
            [
                0.5 * sign * stride.sin(),
                1.0 * step.sin(),
                GRAVITY + 1.5 * a * step.cos() + sign * 2.0 * stride.cos(),
            ],
            [60.0 * sign * stride.sin(), 5.0 * step.cos(), 10.0 * step.sin()],
        ),
        Placement::LeftToe | Placement::RightToe => {
            let impact = if own { 3.0 * a * (-8.0 * local).exp() } else { 0.0 };
            (
                [
                    0.2 * step.cos(),
                    2.0 * sign * stride.sin(),
                    GRAVITY + impact + sign * stride.cos(),
                ],
                [120.0 * sign * stride.sin(), 0.0, 0.0],
            )
        }
    }
}

fn zone_loaded(zone: FootZone, k: usize, local: f64) -> bool {
    let side = match zone {
        FootZone::LeftHeel | FootZone::LeftMid | FootZone::LeftToe => Side::Left,
        _ => Side::Right,
    };
    if foot_of_step(k) != side {
        return false;
    }
    match zone {
        FootZone::LeftHeel | FootZone::RightHeel => local < 0.7,
        FootZone::LeftMid | FootZone::RightMid => local > 0.15 && local < 0.8,
        FootZone::LeftToe | FootZone::RightToe => local > 0.4 && local < 0.95,
    }
}

/// Generate a walking trial with all six placements and, optionally, six pressure zones.
pub fn simulate(params: &SimulationParams) -> Recording {
    let mut rng = StdRng::seed_from_u64(params.seed);
    if params.fs <= 0.0 || params.duration_s <= 0.0 {
        return Recording::new();
    }
    let onsets = step_onsets(params, &mut rng);
    let n = (params.duration_s * params.fs).round() as usize + 1;
    let mut noise = Noise {
        rng: StdRng::seed_from_u64(params.seed.wrapping_add(1)),
    };
    let jitter = params.timestamp_jitter_ms as i64;

    let mut sensors: BTreeMap<Placement, Vec<SensorSample>> = Placement::ALL
        .into_iter()
        .map(|p| (p, Vec::with_capacity(n)))
        .collect();
    for (placement, samples) in sensors.iter_mut() {
        let mut previous: Option<u64> = None;
        for i in 0..n {
            let nominal_ms = (i as f64 * 1000.0 / params.fs).round() as i64;
            let offset = if jitter > 0 {
                rng.gen_range(-jitter..=jitter)
            } else {
                0
            };
            let mut ts = (nominal_ms + offset).max(0) as u64;
            if let Some(prev) = previous {
                ts = ts.max(prev + 1);
            }
            previous = Some(ts);

            let (k, local) = step_phase(&onsets, ts as f64 / 1000.0);
            let (accel, gyro) = inertial(*placement, params, k, local);
            let a = noise.vec3(params.noise);
            let g = noise.vec3(params.gyro_noise);
            samples.push(SensorSample::new(
                ts,
                [accel[0] + a[0], accel[1] + a[1], accel[2] + a[2]],
                [gyro[0] + g[0], gyro[1] + g[1], gyro[2] + g[2]],
            ));
        }
    }

    let mut recording = Recording {
        sensors,
        pressure: BTreeMap::new(),
    };
    if params.with_pressure {
        for zone in FootZone::ALL {
            let values = (0..n)
                .map(|i| {
                    let (k, local) = step_phase(&onsets, i as f64 / params.fs);
                    let base = if zone_loaded(zone, k, local) {
                        FSR_LOADED_V
                    } else {
                        FSR_UNLOADED_V
                    };
                    base + 0.02 * rng.gen_range(-1.0..=1.0)
                })
                .collect();
            recording.pressure.insert(zone, PressureTrace::new(values));
        }
    }
    log::debug!(
        "simulated {:.1}s at {} Hz with {} steps",
        params.duration_s,
        params.fs,
        onsets.len() - 1
    );
    recording
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::validate_samples;

    #[test]
    fn simulation_is_seeded() {
        let params = SimulationParams::default();
        let a = simulate(&params);
        let b = simulate(&params);
        assert_eq!(a.samples(Placement::LeftWaist), b.samples(Placement::LeftWaist));
        let c = simulate(&SimulationParams {
            seed: 99,
            ..params
        });
        assert_ne!(a.samples(Placement::LeftWaist), c.samples(Placement::LeftWaist));
    }

    #[test]
    fn timestamps_increase_and_span_the_duration() {
        let rec = simulate(&SimulationParams::default());
        for placement in Placement::ALL {
            let samples = rec.samples(placement);
            assert_eq!(samples.len(), 2001);
            assert!(validate_samples(samples).is_ok());
            assert!(samples.windows(2).all(|w| w[1].timestamp_ms > w[0].timestamp_ms));
        }
        assert!((rec.duration_s() - 40.0).abs() < 0.01);
        assert_eq!(rec.pressure.len(), 6);
    }

    #[test]
    fn waist_excursion_sets_vertical_amplitude() {
        let params = SimulationParams {
            noise: 0.0,
            ..SimulationParams::default()
        };
        let omega = 2.0 * PI * 115.0 / 60.0;
        assert!((step_amplitude(&params) - 0.025 * omega * omega).abs() < 1e-12);
        let (accel, _) = inertial(Placement::LeftWaist, &params, 0, 0.0);
        assert!((accel[2] - GRAVITY - step_amplitude(&params) - params.stride_amplitude).abs() < 1e-9);
    }

    #[test]
    fn gyro_noise_leaves_acceleration_untouched() {
        let quiet = simulate(&SimulationParams::default());
        let shaky = simulate(&SimulationParams {
            gyro_noise: 30.0,
            ..SimulationParams::default()
        });
        let (a, b) = (quiet.samples(Placement::LeftWaist), shaky.samples(Placement::LeftWaist));
        assert!(a.iter().zip(b).all(|(x, y)| x.accel() == y.accel()));
        assert!(a.iter().zip(b).any(|(x, y)| x.gyro() != y.gyro()));
    }

    #[test]
    fn heel_is_loaded_about_seventy_percent_of_own_steps() {
        let rec = simulate(&SimulationParams {
            with_pressure: true,
            ..SimulationParams::default()
        });
        let heel = rec.pressure(FootZone::LeftHeel).unwrap();
        let loaded = heel.values.iter().filter(|&&v| v < 1.5).count() as f64;
        let share = loaded / heel.len() as f64;
        assert!((share - 0.35).abs() < 0.03, "left heel loaded share {share}");
    }
}
