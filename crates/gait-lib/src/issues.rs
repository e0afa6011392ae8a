use crate::metrics::gait::MetricKind;
use crate::signal::Placement;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A degradation handled inside the engine.
///
/// None of these abort an analysis; they are collected on the result and logged.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisIssue {
    #[error("insufficient data: {duration_s:.1}s with {heel_strikes} heel strikes")]
    InsufficientData { duration_s: f64, heel_strikes: usize },
    #[error("no usable baseline entry for {metric}")]
    MissingBaselineEntry { metric: MetricKind },
    #[error("{metric} fell back to its neutral value: {reason}")]
    DegenerateMetric { metric: MetricKind, reason: String },
    #[error("placement {placement:?} excluded: {reason}")]
    MalformedRecording { placement: Placement, reason: String },
}
