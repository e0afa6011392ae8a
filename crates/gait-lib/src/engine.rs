use crate::{
    baseline::BaselineTable,
    classify::{classify_metrics, MetricOutcome},
    detectors::gait::{detect, DetectorConfig, GaitEvent},
    findings::{synthesize, Finding, FindingCatalog, Summary},
    issues::AnalysisIssue,
    metrics::{
        gait::{extract_with_config, ExtractorConfig, MetricSet},
        quality::{check_sensor_health, DataQuality, SensorHealth},
    },
    signal::Recording,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Calibration for every analysis stage, loadable from TOML.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub detector: DetectorConfig,
    pub extractor: ExtractorConfig,
}

impl EngineConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }
}

/// Classification stages applied to an already extracted [`MetricSet`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub outcomes: Vec<MetricOutcome>,
    pub findings: Vec<Finding>,
    pub summary: Summary,
    pub issues: Vec<AnalysisIssue>,
}

/// Everything produced for one recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub quality: DataQuality,
    pub metrics: MetricSet,
    pub events: Vec<GaitEvent>,
    pub outcomes: Vec<MetricOutcome>,
    pub findings: Vec<Finding>,
    /// Absent when the recording was too short to analyze.
    pub summary: Option<Summary>,
    pub sensor_health: SensorHealth,
    pub issues: Vec<AnalysisIssue>,
}

/// Shared, immutable analysis pipeline. Cheap to clone and safe to call from many threads.
#[derive(Debug, Clone)]
pub struct GaitEngine {
    baseline: Arc<BaselineTable>,
    catalog: Arc<FindingCatalog>,
    config: EngineConfig,
}

impl Default for GaitEngine {
    fn default() -> Self {
        Self::new(BaselineTable::reference_cohort())
    }
}

impl GaitEngine {
    pub fn new(baseline: BaselineTable) -> Self {
        Self::with_shared_baseline(Arc::new(baseline))
    }

    pub fn with_shared_baseline(baseline: Arc<BaselineTable>) -> Self {
        Self {
            baseline,
            catalog: Arc::new(FindingCatalog::default()),
            config: EngineConfig::default(),
        }
    }

    pub fn with_catalog(mut self, catalog: FindingCatalog) -> Self {
        self.catalog = Arc::new(catalog);
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn baseline(&self) -> &BaselineTable {
        &self.baseline
    }

    pub fn catalog(&self) -> &FindingCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Classify and summarize metrics obtained elsewhere.
    pub fn evaluate(&self, metrics: &MetricSet) -> Evaluation {
        let (outcomes, issues) = classify_metrics(metrics, &self.baseline);
        let (findings, summary) = synthesize(&outcomes, &self.catalog);
        Evaluation {
            outcomes,
            findings,
            summary,
            issues,
        }
    }

    pub fn analyze(&self, recording: &Recording) -> AnalysisResult {
        let sensor_health = check_sensor_health(recording);
        for failure in &sensor_health.critical_failures {
            log::warn!("{failure}");
        }

        let detection = detect(recording, &self.config.detector);
        let mut issues = detection.issues;

        if !detection.quality.is_sufficient() {
            let metrics = MetricSet::zeroed(detection.duration_s);
            let (outcomes, _) = classify_metrics(&metrics, &self.baseline);
            return AnalysisResult {
                quality: detection.quality,
                metrics,
                events: Vec::new(),
                outcomes,
                findings: Vec::new(),
                summary: None,
                sensor_health,
                issues,
            };
        }

        let metrics = extract_with_config(
            recording,
            &detection.events,
            detection.quality,
            &self.config.detector,
            &self.config.extractor,
        );
        for (metric, reason) in &metrics.degenerate {
            log::warn!("{metric} fell back to its neutral value: {reason}");
            issues.push(AnalysisIssue::DegenerateMetric {
                metric: *metric,
                reason: reason.clone(),
            });
        }

        let evaluation = self.evaluate(&metrics);
        issues.extend(evaluation.issues);
        log::info!(
            "{} findings ({:?})",
            evaluation.findings.len(),
            evaluation.summary.overall_status
        );

        AnalysisResult {
            quality: detection.quality,
            metrics,
            events: detection.events,
            outcomes: evaluation.outcomes,
            findings: evaluation.findings,
            summary: Some(evaluation.summary),
            sensor_health,
            issues,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        classify::UnclassifiableReason,
        signal::{Placement, SensorSample},
        synth::{simulate, SimulationParams},
    };

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn engine_is_shareable() {
        assert_send_sync::<GaitEngine>();
    }

    #[test]
    fn analyzes_simulated_walk() {
        let engine = GaitEngine::default();
        let result = engine.analyze(&simulate(&SimulationParams::default()));
        assert_eq!(result.quality, DataQuality::Excellent);
        assert_eq!(result.outcomes.len(), 6);
        assert!(result.summary.is_some());
        assert!(result.metrics.step_count > 60);
        assert_eq!(result.sensor_health.working_count, 12);
        assert!(result.issues.is_empty(), "{:?}", result.issues);
    }

    #[test]
    fn healthy_simulated_walk_raises_no_severe_findings() {
        use crate::classify::Severity;
        use crate::findings::OverallStatus;

        let engine = GaitEngine::default();
        for seed in [7, 11, 23] {
            let result = engine.analyze(&simulate(&SimulationParams {
                seed,
                ..SimulationParams::default()
            }));
            let summary = result.summary.expect("sufficient data");
            assert_ne!(summary.overall_status, OverallStatus::NeedsImmediateAttention);
            assert!(
                result.findings.iter().all(|f| f.severity != Severity::Severe),
                "seed {seed}: {:?}",
                result.findings
            );
            let moderate = result
                .findings
                .iter()
                .filter(|f| f.severity == Severity::Moderate)
                .count();
            assert!(moderate <= 2, "seed {seed}: {:?}", result.findings);
            let stride = engine.baseline().get(crate::MetricKind::StrideLength).unwrap();
            let [low, high] = stride.normal_range();
            assert!(
                (low - stride.std..=high + stride.std).contains(&result.metrics.stride_length),
                "seed {seed}: stride {}",
                result.metrics.stride_length
            );
        }
    }

    #[test]
    fn short_recording_has_no_summary() {
        let samples: Vec<SensorSample> = (0..30)
            .map(|i| SensorSample::new(i * 20, [0.0, 0.0, 9.81], [0.0; 3]))
            .collect();
        let rec = Recording::new().with_placement(Placement::RightKnee, samples);
        let result = GaitEngine::default().analyze(&rec);
        assert_eq!(result.quality, DataQuality::InsufficientData);
        assert!(result.summary.is_none());
        assert!(result.findings.is_empty());
        assert!(result.events.is_empty());
        assert!(result.outcomes.iter().all(|o| matches!(
            o,
            MetricOutcome::Unclassifiable {
                reason: UnclassifiableReason::NoSteps,
                ..
            }
        )));
    }

    #[test]
    fn degenerate_metrics_become_issues() {
        let mut rec = simulate(&SimulationParams::default());
        rec.sensors.remove(&Placement::LeftWaist);
        let result = GaitEngine::default().analyze(&rec);
        assert!(result.issues.iter().any(|issue| matches!(
            issue,
            AnalysisIssue::DegenerateMetric {
                metric: crate::MetricKind::GaitSymmetry,
                ..
            }
        )));
        assert!(result
            .findings
            .iter()
            .all(|f| f.metric != crate::MetricKind::GaitSymmetry));
    }

    #[test]
    fn parallel_analyses_agree() {
        let engine = GaitEngine::default();
        let recording = simulate(&SimulationParams::default());
        let expected = serde_json::to_value(engine.analyze(&recording)).unwrap();
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| serde_json::to_value(engine.analyze(&recording)).unwrap()))
                .collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap(), expected);
            }
        });
    }

    #[test]
    fn config_loads_partial_toml() {
        let cfg = EngineConfig::from_toml_str(
            r#"
            [detector]
            max_cadence_spm = 180.0

            [detector.pressure]
            polarity = "rising"
            contact_threshold = 20.0

            [extractor]
            stride_gain = 0.4
            "#,
        )
        .unwrap();
        assert_eq!(cfg.detector.max_cadence_spm, 180.0);
        assert_eq!(cfg.detector.min_samples, 50);
        assert_eq!(
            cfg.detector.pressure.polarity,
            crate::detectors::gait::LoadPolarity::Rising
        );
        assert_eq!(cfg.extractor.stride_gain, 0.4);
        assert_eq!(cfg.extractor.neutral_score, 0.5);
    }
}
