use crate::metrics::gait::MetricKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Population statistics for one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaselineEntry {
    pub mean: f64,
    pub std: f64,
    pub p5: f64,
    pub p25: f64,
    pub p75: f64,
    pub p95: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BaselineError {
    #[error("baseline entry for {0} has a non-finite value")]
    NonFinite(String),
    #[error("baseline entry for {0} has a negative std")]
    NegativeStd(String),
    #[error("baseline entry for {0} has unordered percentiles")]
    UnorderedPercentiles(String),
    #[error("unknown baseline metric `{0}`")]
    UnknownMetric(String),
}

impl BaselineEntry {
    pub fn new(stats: [f64; 8]) -> Self {
        let [mean, std, p5, p25, p75, p95, min, max] = stats;
        Self {
            mean,
            std,
            p5,
            p25,
            p75,
            p95,
            min,
            max,
        }
    }

    fn values(&self) -> [f64; 8] {
        [
            self.mean, self.std, self.p5, self.p25, self.p75, self.p95, self.min, self.max,
        ]
    }

    pub fn validate(&self, name: &str) -> Result<(), BaselineError> {
        if self.values().iter().any(|v| !v.is_finite()) {
            return Err(BaselineError::NonFinite(name.to_string()));
        }
        if self.std < 0.0 {
            return Err(BaselineError::NegativeStd(name.to_string()));
        }
        let ordered = self.p5 <= self.p25
            && self.p25 <= self.p75
            && self.p75 <= self.p95
            && self.min <= self.max;
        if !ordered {
            return Err(BaselineError::UnorderedPercentiles(name.to_string()));
        }
        Ok(())
    }

    /// Interquartile range reported as the normal range.
    pub fn normal_range(&self) -> [f64; 2] {
        [self.p25, self.p75]
    }
}

/// Validated baseline statistics keyed by metric.
///
/// Deserializes from a `name -> entry` map; unknown names and invalid entries are
/// dropped with a warning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, BaselineEntry>", into = "BTreeMap<String, BaselineEntry>")]
pub struct BaselineTable {
    entries: BTreeMap<MetricKind, BaselineEntry>,
}

impl BaselineTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_named(named: BTreeMap<String, BaselineEntry>) -> Self {
        let mut table = Self::new();
        for (name, entry) in named {
            let inserted = name
                .parse::<MetricKind>()
                .map_err(|_| BaselineError::UnknownMetric(name.clone()))
                .and_then(|kind| table.insert(kind, entry));
            if let Err(err) = inserted {
                log::warn!("dropping baseline entry: {err}");
            }
        }
        table
    }

    pub fn insert(&mut self, metric: MetricKind, entry: BaselineEntry) -> Result<(), BaselineError> {
        entry.validate(metric.name())?;
        self.entries.insert(metric, entry);
        Ok(())
    }

    pub fn get(&self, metric: MetricKind) -> Option<&BaselineEntry> {
        self.entries.get(&metric)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MetricKind, &BaselineEntry)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    /// Healthy adult reference cohort.
    pub fn reference_cohort() -> Self {
        let rows = [
            (MetricKind::Cadence, [112.0, 8.0, 98.84, 106.61, 117.39, 125.16, 96.5, 128.4]),
            (MetricKind::Velocity, [1.40, 0.20, 1.071, 1.265, 1.535, 1.729, 1.02, 1.78]),
            (MetricKind::StrideLength, [1.35, 0.12, 1.153, 1.269, 1.431, 1.547, 1.11, 1.59]),
            (MetricKind::GaitSymmetry, [0.93, 0.04, 0.864, 0.903, 0.957, 0.996, 0.85, 0.998]),
            (MetricKind::StabilityScore, [0.86, 0.06, 0.761, 0.820, 0.900, 0.959, 0.74, 0.97]),
            (MetricKind::StepRegularity, [0.90, 0.05, 0.818, 0.866, 0.934, 0.982, 0.80, 0.99]),
        ];
        Self {
            entries: rows
                .into_iter()
                .map(|(kind, stats)| (kind, BaselineEntry::new(stats)))
                .collect(),
        }
    }
}

impl From<BTreeMap<String, BaselineEntry>> for BaselineTable {
    fn from(named: BTreeMap<String, BaselineEntry>) -> Self {
        Self::from_named(named)
    }
}

impl From<BaselineTable> for BTreeMap<String, BaselineEntry> {
    fn from(table: BaselineTable) -> Self {
        table
            .entries
            .into_iter()
            .map(|(kind, entry)| (kind.name().to_string(), entry))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_cohort_is_complete_and_valid() {
        let table = BaselineTable::reference_cohort();
        assert_eq!(table.len(), MetricKind::ALL.len());
        for (kind, entry) in table.iter() {
            entry.validate(kind.name()).unwrap();
        }
    }

    #[test]
    fn invalid_and_unknown_entries_are_dropped() {
        let json = r#"{
            "cadence": {"mean": 110, "std": 8, "p5": 97, "p25": 105, "p75": 115, "p95": 123, "min": 90, "max": 130},
            "velocity": {"mean": 1.3, "std": -0.1, "p5": 1, "p25": 1.2, "p75": 1.4, "p95": 1.6, "min": 0.9, "max": 1.8},
            "stride_length": {"mean": 1.3, "std": 0.1, "p5": 1.2, "p25": 1.1, "p75": 1.4, "p95": 1.5, "min": 1, "max": 1.6},
            "tempo": {"mean": 1, "std": 1, "p5": 1, "p25": 1, "p75": 1, "p95": 1, "min": 1, "max": 1}
        }"#;
        let table: BaselineTable = serde_json::from_str(json).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(MetricKind::Cadence).map(|e| e.mean), Some(110.0));
        assert!(table.get(MetricKind::Velocity).is_none());
    }

    #[test]
    fn validate_reports_the_first_problem() {
        let mut entry = BaselineTable::reference_cohort()
            .get(MetricKind::Cadence)
            .copied()
            .unwrap();
        entry.p95 = f64::NAN;
        assert_eq!(
            entry.validate("cadence"),
            Err(BaselineError::NonFinite("cadence".into()))
        );
        let mut table = BaselineTable::new();
        assert!(table.insert(MetricKind::Cadence, entry).is_err());
        assert!(table.is_empty());
    }

    #[test]
    fn table_serializes_by_metric_name() {
        let json = serde_json::to_value(BaselineTable::reference_cohort()).unwrap();
        assert!(json.get("stability_score").is_some());
        let back: BaselineTable = serde_json::from_value(json).unwrap();
        assert_eq!(back, BaselineTable::reference_cohort());
    }
}
