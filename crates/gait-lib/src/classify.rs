//! Percentile classification of metric values against a baseline.

use crate::{
    baseline::{BaselineEntry, BaselineTable},
    issues::AnalysisIssue,
    metrics::gait::{MetricKind, MetricSet},
};
use serde::{Deserialize, Serialize};
use std::f64::consts::SQRT_2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    HigherIsBetter,
    LowerIsBetter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    None,
    Moderate,
    Severe,
}

impl Severity {
    pub fn name(self) -> &'static str {
        match self {
            Severity::None => "none",
            Severity::Moderate => "moderate",
            Severity::Severe => "severe",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// Population percentile, always within 1..=99.
    pub percentile: u8,
    pub severity: Severity,
}

/// Standard score against the entry. A zero std or a NaN input scores 0, the median.
pub fn z_score(value: f64, entry: &BaselineEntry) -> f64 {
    if entry.std == 0.0 {
        return 0.0;
    }
    let z = (value - entry.mean) / entry.std;
    if z.is_nan() {
        0.0
    } else {
        z
    }
}

pub fn standard_normal_cdf(z: f64) -> f64 {
    0.5 * libm::erfc(-z / SQRT_2)
}

/// Whole percentile in 1..=99; NaN maps to 50.
pub fn percentile(z: f64) -> u8 {
    if z.is_nan() {
        return 50;
    }
    (standard_normal_cdf(z) * 100.0).floor().clamp(1.0, 99.0) as u8
}

/// Severity from the percentile on the adverse side of the distribution.
pub fn severity_for(percentile: u8, direction: Direction) -> Severity {
    let adverse = match direction {
        Direction::HigherIsBetter => percentile,
        Direction::LowerIsBetter => 100 - percentile.min(100),
    };
    if adverse < 5 {
        Severity::Severe
    } else if adverse < 25 {
        Severity::Moderate
    } else {
        Severity::None
    }
}

pub fn classify(value: f64, entry: &BaselineEntry, direction: Direction) -> Classification {
    let percentile = percentile(z_score(value, entry));
    Classification {
        percentile,
        severity: severity_for(percentile, direction),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnclassifiableReason {
    NoSteps,
    Degenerate,
    MissingBaseline,
    NonFinite,
}

/// Per-metric classification result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MetricOutcome {
    Classified {
        metric: MetricKind,
        value: f64,
        percentile: u8,
        severity: Severity,
        normal_range: [f64; 2],
    },
    Unclassifiable {
        metric: MetricKind,
        reason: UnclassifiableReason,
    },
}

impl MetricOutcome {
    pub fn metric(&self) -> MetricKind {
        match self {
            MetricOutcome::Classified { metric, .. } | MetricOutcome::Unclassifiable { metric, .. } => {
                *metric
            }
        }
    }

    pub fn severity(&self) -> Option<Severity> {
        match self {
            MetricOutcome::Classified { severity, .. } => Some(*severity),
            MetricOutcome::Unclassifiable { .. } => None,
        }
    }
}

/// Classify every metric in declaration order.
pub fn classify_metrics(
    metrics: &MetricSet,
    table: &BaselineTable,
) -> (Vec<MetricOutcome>, Vec<AnalysisIssue>) {
    let mut issues = Vec::new();
    let outcomes = MetricKind::ALL
        .into_iter()
        .map(|metric| {
            let unclassifiable =
                |reason| MetricOutcome::Unclassifiable { metric, reason };
            if metrics.step_count == 0 {
                return unclassifiable(UnclassifiableReason::NoSteps);
            }
            if metrics.is_degenerate(metric) {
                return unclassifiable(UnclassifiableReason::Degenerate);
            }
            let value = metrics.value(metric);
            if !value.is_finite() {
                return unclassifiable(UnclassifiableReason::NonFinite);
            }
            let Some(entry) = table.get(metric) else {
                log::warn!("no baseline entry for {metric}");
                issues.push(AnalysisIssue::MissingBaselineEntry { metric });
                return unclassifiable(UnclassifiableReason::MissingBaseline);
            };
            let Classification {
                percentile,
                severity,
            } = classify(value, entry, metric.direction());
            MetricOutcome::Classified {
                metric,
                value,
                percentile,
                severity,
                normal_range: entry.normal_range(),
            }
        })
        .collect();
    (outcomes, issues)
}
