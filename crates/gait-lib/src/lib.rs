//! Gait signal processing and anomaly classification.
//!
//! A buffered multi-sensor walking [`Recording`] flows through
//! [`detectors::gait::detect`] (heel strikes, stance/swing events),
//! [`metrics::gait::extract`] (cadence, velocity, stride length, symmetry, stability,
//! regularity), [`classify::classify_metrics`] (percentile against a [`BaselineTable`]) and
//! [`findings::synthesize`] (ordered clinical findings plus a summary).
//! [`GaitEngine`] wires the stages together.

pub mod baseline;
pub mod classify;
pub mod detectors;
pub mod engine;
pub mod findings;
pub mod io;
pub mod issues;
pub mod metrics;
pub mod signal;
pub mod synth;

pub use baseline::{BaselineEntry, BaselineError, BaselineTable};
pub use classify::{classify, classify_metrics, Direction, MetricOutcome, Severity};
pub use detectors::gait::{detect, DetectorConfig, Detection, GaitEvent, GaitPhase};
pub use engine::{AnalysisResult, EngineConfig, Evaluation, GaitEngine};
pub use findings::{synthesize, Finding, FindingCatalog, Summary};
pub use issues::AnalysisIssue;
pub use metrics::gait::{extract, ExtractorConfig, MetricKind, MetricSet};
pub use metrics::quality::{DataQuality, SensorHealth};
pub use signal::{FootZone, Placement, PressureTrace, Recording, SensorSample, Side};
