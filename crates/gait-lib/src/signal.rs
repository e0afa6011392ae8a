use realfft::{num_complex::Complex, RealFftPlanner};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Standard gravity (m/s²).
pub const GRAVITY: f64 = 9.81;

/// Body side of a sensor placement or foot zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

/// Inertial sensor placement. Serialized names follow the acquisition firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Placement {
    LeftWaist,
    RightWaist,
    LeftKnee,
    RightKnee,
    LeftToe,
    RightToe,
}

impl Placement {
    /// Reference preference order: waist placements are the most stable.
    pub const ALL: [Placement; 6] = [
        Placement::LeftWaist,
        Placement::RightWaist,
        Placement::LeftKnee,
        Placement::RightKnee,
        Placement::LeftToe,
        Placement::RightToe,
    ];

    pub fn side(self) -> Side {
        match self {
            Placement::LeftWaist | Placement::LeftKnee | Placement::LeftToe => Side::Left,
            _ => Side::Right,
        }
    }

    pub fn is_waist(self) -> bool {
        matches!(self, Placement::LeftWaist | Placement::RightWaist)
    }

    pub fn waist(side: Side) -> Placement {
        match side {
            Side::Left => Placement::LeftWaist,
            Side::Right => Placement::RightWaist,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Placement::LeftWaist => "LEFT_WAIST",
            Placement::RightWaist => "RIGHT_WAIST",
            Placement::LeftKnee => "LEFT_KNEE",
            Placement::RightKnee => "RIGHT_KNEE",
            Placement::LeftToe => "LEFT_TOE",
            Placement::RightToe => "RIGHT_TOE",
        }
    }
}

/// Foot pressure zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FootZone {
    LeftHeel,
    LeftMid,
    LeftToe,
    RightHeel,
    RightMid,
    RightToe,
}

impl FootZone {
    pub const ALL: [FootZone; 6] = [
        FootZone::LeftHeel,
        FootZone::LeftMid,
        FootZone::LeftToe,
        FootZone::RightHeel,
        FootZone::RightMid,
        FootZone::RightToe,
    ];

    pub fn heel(side: Side) -> FootZone {
        match side {
            Side::Left => FootZone::LeftHeel,
            Side::Right => FootZone::RightHeel,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FootZone::LeftHeel => "LEFT_HEEL",
            FootZone::LeftMid => "LEFT_MID",
            FootZone::LeftToe => "LEFT_TOE",
            FootZone::RightHeel => "RIGHT_HEEL",
            FootZone::RightMid => "RIGHT_MID",
            FootZone::RightToe => "RIGHT_TOE",
        }
    }
}

/// One timestamped inertial reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorSample {
    /// Monotonic timestamp in milliseconds.
    #[serde(rename = "timestamp")]
    pub timestamp_ms: u64,
    pub ax: f64,
    pub ay: f64,
    pub az: f64,
    #[serde(default)]
    pub gx: f64,
    #[serde(default)]
    pub gy: f64,
    #[serde(default)]
    pub gz: f64,
}

impl SensorSample {
    pub fn new(timestamp_ms: u64, accel: [f64; 3], gyro: [f64; 3]) -> Self {
        Self {
            timestamp_ms,
            ax: accel[0],
            ay: accel[1],
            az: accel[2],
            gx: gyro[0],
            gy: gyro[1],
            gz: gyro[2],
        }
    }

    pub fn accel(&self) -> [f64; 3] {
        [self.ax, self.ay, self.az]
    }

    pub fn gyro(&self) -> [f64; 3] {
        [self.gx, self.gy, self.gz]
    }

    pub fn is_finite(&self) -> bool {
        self.accel().iter().chain(self.gyro().iter()).all(|v| v.is_finite())
    }
}

/// Pressure/voltage readings for one foot zone; index implies time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PressureTrace {
    pub values: Vec<f64>,
}

impl PressureTrace {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Peak-to-peak range, zero for empty traces.
    pub fn range(&self) -> f64 {
        let (min, max) = self
            .values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        if min.is_finite() && max.is_finite() {
            max - min
        } else {
            0.0
        }
    }
}

/// One buffered walking trial: inertial streams per placement plus pressure per foot zone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Recording {
    #[serde(alias = "sensor_data")]
    pub sensors: BTreeMap<Placement, Vec<SensorSample>>,
    #[serde(default, alias = "fsr_data")]
    pub pressure: BTreeMap<FootZone, PressureTrace>,
}

impl Recording {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_placement(mut self, placement: Placement, samples: Vec<SensorSample>) -> Self {
        self.sensors.insert(placement, samples);
        self
    }

    pub fn with_pressure(mut self, zone: FootZone, trace: PressureTrace) -> Self {
        self.pressure.insert(zone, trace);
        self
    }

    pub fn samples(&self, placement: Placement) -> &[SensorSample] {
        self.sensors
            .get(&placement)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn pressure(&self, zone: FootZone) -> Option<&PressureTrace> {
        self.pressure.get(&zone)
    }

    /// Longest placement span in seconds.
    pub fn duration_s(&self) -> f64 {
        self.sensors
            .values()
            .map(|samples| span_s(samples))
            .fold(0.0, f64::max)
    }
}

/// Wall-clock span of a sample sequence in seconds.
pub fn span_s(samples: &[SensorSample]) -> f64 {
    match (samples.first(), samples.last()) {
        (Some(first), Some(last)) if last.timestamp_ms > first.timestamp_ms => {
            (last.timestamp_ms - first.timestamp_ms) as f64 / 1000.0
        }
        _ => 0.0,
    }
}

/// Check that timestamps never go backwards and every value is finite.
pub fn validate_samples(samples: &[SensorSample]) -> Result<(), String> {
    if let Some(idx) = samples.iter().position(|s| !s.is_finite()) {
        return Err(format!("non-finite reading at sample {idx}"));
    }
    if let Some(idx) = samples
        .windows(2)
        .position(|w| w[1].timestamp_ms < w[0].timestamp_ms)
    {
        return Err(format!("timestamp goes backwards at sample {}", idx + 1));
    }
    Ok(())
}

/// A placement resampled onto a uniform time grid.
#[derive(Debug, Clone)]
pub struct UniformTrace {
    pub fs: f64,
    pub accel: Vec<[f64; 3]>,
    pub gyro: Vec<[f64; 3]>,
}

impl UniformTrace {
    pub fn len(&self) -> usize {
        self.accel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accel.is_empty()
    }

    pub fn duration_s(&self) -> f64 {
        if self.accel.len() < 2 || self.fs <= 0.0 {
            return 0.0;
        }
        (self.accel.len() - 1) as f64 / self.fs
    }

    pub fn accel_magnitude(&self) -> Vec<f64> {
        magnitude(&self.accel)
    }

    pub fn gyro_magnitude(&self) -> Vec<f64> {
        magnitude(&self.gyro)
    }

    pub fn axis(&self, axis: Axis) -> Vec<f64> {
        let idx = axis.index();
        self.accel.iter().map(|v| v[idx]).collect()
    }
}

/// Accelerometer axis selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// Linearly resample `samples` onto `n` points starting at `t0_ms` spaced `1/fs` apart.
///
/// Grid points outside the sample span hold the nearest edge value. Samples must have
/// non-decreasing timestamps.
pub fn resample(samples: &[SensorSample], t0_ms: f64, fs: f64, n: usize) -> UniformTrace {
    let mut accel = Vec::with_capacity(n);
    let mut gyro = Vec::with_capacity(n);
    if samples.is_empty() || fs <= 0.0 {
        return UniformTrace { fs, accel, gyro };
    }
    let step_ms = 1000.0 / fs;
    let mut k = 0usize;
    for j in 0..n {
        let t = t0_ms + j as f64 * step_ms;
        while k + 1 < samples.len() && (samples[k + 1].timestamp_ms as f64) <= t {
            k += 1;
        }
        let a = &samples[k];
        let ta = a.timestamp_ms as f64;
        if k + 1 >= samples.len() || t <= ta {
            accel.push(a.accel());
            gyro.push(a.gyro());
            continue;
        }
        let b = &samples[k + 1];
        let tb = b.timestamp_ms as f64;
        let w = if tb > ta { (t - ta) / (tb - ta) } else { 1.0 };
        accel.push(lerp3(a.accel(), b.accel(), w));
        gyro.push(lerp3(a.gyro(), b.gyro(), w));
    }
    UniformTrace { fs, accel, gyro }
}

fn lerp3(a: [f64; 3], b: [f64; 3], w: f64) -> [f64; 3] {
    [
        a[0] + (b[0] - a[0]) * w,
        a[1] + (b[1] - a[1]) * w,
        a[2] + (b[2] - a[2]) * w,
    ]
}

pub fn magnitude(vectors: &[[f64; 3]]) -> Vec<f64> {
    vectors
        .iter()
        .map(|v| (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt())
        .collect()
}

pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Population standard deviation.
pub fn std_dev(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let m = mean(data);
    (data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / data.len() as f64).sqrt()
}

/// Pearson correlation over the common prefix. `None` when either side has no variance.
pub fn pearson(a: &[f64], b: &[f64]) -> Option<f64> {
    let n = a.len().min(b.len());
    if n < 2 {
        return None;
    }
    let (a, b) = (&a[..n], &b[..n]);
    let (ma, mb) = (mean(a), mean(b));
    let mut cov = 0.0;
    let mut va = 0.0;
    let mut vb = 0.0;
    for (x, y) in a.iter().zip(b) {
        let dx = x - ma;
        let dy = y - mb;
        cov += dx * dy;
        va += dx * dx;
        vb += dy * dy;
    }
    let denom = (va * vb).sqrt();
    if denom <= f64::EPSILON || !denom.is_finite() {
        return None;
    }
    Some((cov / denom).clamp(-1.0, 1.0))
}

/// Least-squares line through `(i, segment[i])`, returned as `(slope, intercept)`.
pub fn linear_fit(segment: &[f64]) -> (f64, f64) {
    let n = segment.len();
    if n < 2 {
        let first = segment.first().copied().unwrap_or(0.0);
        return (0.0, first);
    }
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_xx = 0.0;
    let mut sum_xy = 0.0;
    for (i, &y) in segment.iter().enumerate() {
        let x = i as f64;
        sum_x += x;
        sum_y += y;
        sum_xx += x * x;
        sum_xy += x * y;
    }
    let n_f = n as f64;
    let denom = n_f * sum_xx - sum_x * sum_x;
    if denom.abs() < f64::EPSILON {
        return (0.0, sum_y / n_f);
    }
    let slope = (n_f * sum_xy - sum_x * sum_y) / denom;
    let intercept = (sum_y - slope * sum_x) / n_f;
    (slope, intercept)
}

pub fn detrend(segment: &[f64]) -> Vec<f64> {
    let (slope, intercept) = linear_fit(segment);
    segment
        .iter()
        .enumerate()
        .map(|(i, y)| y - (slope * i as f64 + intercept))
        .collect()
}

/// Cumulative trapezoidal integral with sample spacing `dt`, starting at zero.
pub fn integrate(data: &[f64], dt: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(data.len());
    let mut acc = 0.0;
    for (i, &x) in data.iter().enumerate() {
        if i > 0 {
            acc += 0.5 * (x + data[i - 1]) * dt;
        }
        out.push(acc);
    }
    out
}

fn remove_mean(data: &[f64]) -> Vec<f64> {
    let m = mean(data);
    data.iter().map(|x| x - m).collect()
}

/// Zero-phase FFT band-pass: bins outside `[low_hz, high_hz]` are zeroed.
///
/// Falls back to mean removal for very short inputs or if the transform fails.
pub fn bandpass(data: &[f64], fs: f64, low_hz: f64, high_hz: f64) -> Vec<f64> {
    let n = data.len();
    if n < 4 || fs <= 0.0 || high_hz <= low_hz {
        return remove_mean(data);
    }
    let mut planner = RealFftPlanner::<f64>::new();
    let forward = planner.plan_fft_forward(n);
    let inverse = planner.plan_fft_inverse(n);
    let mut buffer = data.to_vec();
    let mut spectrum = forward.make_output_vec();
    if forward.process(&mut buffer, &mut spectrum).is_err() {
        return remove_mean(data);
    }
    let bin_hz = fs / n as f64;
    for (k, bin) in spectrum.iter_mut().enumerate() {
        let f = k as f64 * bin_hz;
        if f < low_hz || f > high_hz {
            *bin = Complex::new(0.0, 0.0);
        }
    }
    // The inverse transform rejects imaginary parts on the DC and Nyquist bins.
    spectrum[0].im = 0.0;
    if n % 2 == 0 {
        if let Some(last) = spectrum.last_mut() {
            last.im = 0.0;
        }
    }
    let mut output = inverse.make_output_vec();
    if inverse.process(&mut spectrum, &mut output).is_err() {
        return remove_mean(data);
    }
    let scale = 1.0 / n as f64;
    output.into_iter().map(|x| x * scale).collect()
}
