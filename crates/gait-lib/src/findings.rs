//! Clinical findings and the overall summary built from classified metrics.

use crate::{
    classify::{MetricOutcome, Severity},
    metrics::gait::MetricKind,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Speed & Rhythm")]
    SpeedAndRhythm,
    #[serde(rename = "Balance & Symmetry")]
    BalanceAndSymmetry,
    #[serde(rename = "Gait Pattern")]
    GaitPattern,
}

impl Category {
    pub fn label(self) -> &'static str {
        match self {
            Category::SpeedAndRhythm => "Speed & Rhythm",
            Category::BalanceAndSymmetry => "Balance & Symmetry",
            Category::GaitPattern => "Gait Pattern",
        }
    }

    pub fn rank(self) -> u8 {
        self as u8
    }
}

/// Text for one metric at one severity.
///
/// `description` may contain `{value}` and `{percentile}` placeholders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindingTemplate {
    pub problem: String,
    pub description: String,
    pub impact: String,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl FindingTemplate {
    fn new(problem: &str, description: &str, impact: &str, recommendations: &[&str]) -> Self {
        Self {
            problem: problem.to_string(),
            description: description.to_string(),
            impact: impact.to_string(),
            recommendations: recommendations.iter().map(|r| r.to_string()).collect(),
        }
    }

    fn render(&self, value: &str, percentile: u8) -> String {
        self.description
            .replace("{value}", value)
            .replace("{percentile}", &percentile.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CatalogError {
    #[error("unknown catalog metric `{0}`")]
    UnknownMetric(String),
    #[error("unknown catalog severity `{severity}` for {metric}")]
    UnknownSeverity { metric: String, severity: String },
}

type RawCatalog = BTreeMap<String, BTreeMap<String, FindingTemplate>>;

/// Finding text keyed by metric, then severity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCatalog", into = "RawCatalog")]
pub struct FindingCatalog {
    templates: BTreeMap<MetricKind, BTreeMap<Severity, FindingTemplate>>,
}

impl FindingCatalog {
    pub fn empty() -> Self {
        Self {
            templates: BTreeMap::new(),
        }
    }

    pub fn get(&self, metric: MetricKind, severity: Severity) -> Option<&FindingTemplate> {
        self.templates.get(&metric)?.get(&severity)
    }

    pub fn insert(&mut self, metric: MetricKind, severity: Severity, template: FindingTemplate) {
        self.templates
            .entry(metric)
            .or_default()
            .insert(severity, template);
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }
}

impl TryFrom<RawCatalog> for FindingCatalog {
    type Error = CatalogError;

    fn try_from(raw: RawCatalog) -> Result<Self, Self::Error> {
        let mut catalog = Self::empty();
        for (metric_name, by_severity) in raw {
            let metric = metric_name
                .parse::<MetricKind>()
                .map_err(|_| CatalogError::UnknownMetric(metric_name.clone()))?;
            for (severity_name, template) in by_severity {
                let severity = match severity_name.as_str() {
                    "severe" => Severity::Severe,
                    "moderate" => Severity::Moderate,
                    _ => {
                        return Err(CatalogError::UnknownSeverity {
                            metric: metric_name,
                            severity: severity_name,
                        })
                    }
                };
                catalog.insert(metric, severity, template);
            }
        }
        Ok(catalog)
    }
}

impl From<FindingCatalog> for RawCatalog {
    fn from(catalog: FindingCatalog) -> Self {
        catalog
            .templates
            .into_iter()
            .map(|(metric, by_severity)| {
                let inner = by_severity
                    .into_iter()
                    .map(|(severity, template)| (severity.name().to_string(), template))
                    .collect();
                (metric.name().to_string(), inner)
            })
            .collect()
    }
}

impl Default for FindingCatalog {
    fn default() -> Self {
        use MetricKind::*;
        use Severity::{Moderate, Severe};

        let mut c = Self::empty();
        c.insert(Cadence, Severe, FindingTemplate::new(
            "slow_cadence",
            "Your walking pace ({value} steps/min) is significantly slower than normal (below {percentile}th percentile).",
            "Severely reduced walking speed affects daily activities, community mobility, and crossing streets safely.",
            &[
                "Metronome-paced walking at progressively faster tempos",
                "High knee marching exercises",
                "Quick stepping drills with cues",
                "Rhythmic auditory stimulation therapy",
            ],
        ));
        c.insert(Cadence, Moderate, FindingTemplate::new(
            "slow_cadence",
            "Your walking pace ({value} steps/min) is below average ({percentile}th percentile).",
            "Reduced walking pace may cause fatigue and limit daily mobility.",
            &[
                "Progressive speed walking exercises",
                "Treadmill training with gradual speed increases",
                "Interval training (alternating speeds)",
            ],
        ));
        c.insert(Velocity, Severe, FindingTemplate::new(
            "slow_velocity",
            "Your walking speed ({value} m/s) is significantly slower than normal (below {percentile}th percentile).",
            "Very slow walking speed severely limits community mobility, crossing streets, and daily activities.",
            &[
                "Progressive treadmill training",
                "Fast walking intervals",
                "Overground speed training",
                "Resistance training for leg strength",
                "Dual-task training (walking + cognitive task)",
            ],
        ));
        c.insert(Velocity, Moderate, FindingTemplate::new(
            "slow_velocity",
            "Your walking speed ({value} m/s) is below average ({percentile}th percentile).",
            "Reduced speed may affect community mobility.",
            &[
                "Speed walking exercises",
                "Interval training",
                "Strength training to improve power",
            ],
        ));
        c.insert(StrideLength, Severe, FindingTemplate::new(
            "short_stride",
            "Your stride length ({value}m) is significantly shorter than normal (below {percentile}th percentile).",
            "Very short strides severely reduce walking efficiency and speed.",
            &[
                "Lunge walking exercises to extend stride",
                "Heel-to-toe walking with exaggerated steps",
                "Visual targets for step length training",
                "Hip flexor and extensor strengthening",
                "Flexibility exercises for hip and ankle",
            ],
        ));
        c.insert(StrideLength, Moderate, FindingTemplate::new(
            "short_stride",
            "Your stride length ({value}m) is below average ({percentile}th percentile).",
            "Shorter strides reduce walking efficiency.",
            &[
                "Obstacle stepping exercises",
                "Step length awareness training",
                "Progressive stride lengthening drills",
            ],
        ));
        c.insert(GaitSymmetry, Severe, FindingTemplate::new(
            "asymmetric_gait",
            "Your gait shows significant asymmetry (symmetry score: {value}, below {percentile}th percentile).",
            "Severe asymmetry increases fall risk, causes uneven joint loading, and reduces walking efficiency.",
            &[
                "Single-leg stance exercises (weaker side)",
                "Weight-shifting drills",
                "Mirror therapy for gait training",
                "Bilateral coordination exercises",
                "Task-specific training focusing on affected side",
            ],
        ));
        c.insert(GaitSymmetry, Moderate, FindingTemplate::new(
            "asymmetric_gait",
            "Your gait shows mild asymmetry ({value}, {percentile}th percentile).",
            "Asymmetry may lead to compensatory patterns and joint stress over time.",
            &[
                "Balance training exercises",
                "Step-up exercises (affected side)",
                "Lunges with focus on symmetry",
            ],
        ));
        c.insert(StabilityScore, Severe, FindingTemplate::new(
            "poor_stability",
            "Your walking stability is significantly compromised (score: {value}, below {percentile}th percentile).",
            "Poor stability greatly increases fall risk and limits confidence in walking.",
            &[
                "Balance training on stable surfaces first",
                "Tandem walking exercises",
                "Single-leg stance practice",
                "Core strengthening exercises",
                "Gait training with assistive device if needed",
            ],
        ));
        c.insert(StabilityScore, Moderate, FindingTemplate::new(
            "poor_stability",
            "Your walking stability shows room for improvement (score: {value}, {percentile}th percentile).",
            "Reduced stability may affect confidence and increase caution during walking.",
            &[
                "Balance exercises",
                "Strength training for lower extremities",
                "Walking on varied surfaces",
            ],
        ));
        c.insert(StepRegularity, Severe, FindingTemplate::new(
            "irregular_steps",
            "Your steps show significant irregularity (regularity score: {value}, below {percentile}th percentile).",
            "Highly irregular steps indicate poor motor control and increase fall risk.",
            &[
                "Metronome-paced walking for rhythm training",
                "Visual cues for step placement",
                "Rhythmic auditory cueing therapy",
                "Task-specific gait training",
            ],
        ));
        c.insert(StepRegularity, Moderate, FindingTemplate::new(
            "irregular_steps",
            "Your steps show some irregularity (regularity score: {value}, {percentile}th percentile).",
            "Irregular steps may affect walking efficiency and smoothness.",
            &[
                "Rhythm training exercises",
                "Paced walking drills",
                "Stepping pattern exercises",
            ],
        ));
        c
    }
}

/// One detected abnormality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub problem: String,
    pub metric: MetricKind,
    pub severity: Severity,
    pub category: Category,
    pub current_value: f64,
    pub normal_range: String,
    pub percentile: u8,
    pub description: String,
    pub impact: String,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Normal,
    NeedsImprovement,
    NeedsImmediateAttention,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    LowModerate,
    Moderate,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub overall_status: OverallStatus,
    pub risk_level: RiskLevel,
    pub total_findings: usize,
    pub severe_count: usize,
    pub moderate_count: usize,
    pub summary: String,
}

fn round_to(value: f64, decimals: usize) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round() / scale
}

fn severity_rank(severity: Severity) -> u8 {
    match severity {
        Severity::Severe => 0,
        Severity::Moderate => 1,
        Severity::None => 2,
    }
}

fn build_finding(
    metric: MetricKind,
    value: f64,
    percentile: u8,
    severity: Severity,
    normal_range: [f64; 2],
    catalog: &FindingCatalog,
) -> Finding {
    let decimals = metric.decimals();
    let shown = format!("{value:.decimals$}");
    let range = format!(
        "{:.prec$} - {:.prec$}",
        normal_range[0],
        normal_range[1],
        prec = decimals
    );
    let (problem, description, impact, recommendations) = match catalog.get(metric, severity) {
        Some(template) => (
            template.problem.clone(),
            template.render(&shown, percentile),
            template.impact.clone(),
            template.recommendations.clone(),
        ),
        None => {
            log::warn!("no finding template for {metric} ({})", severity.name());
            (
                format!("abnormal_{metric}"),
                format!(
                    "{} is outside the normal range ({shown} {}, {percentile}th percentile).",
                    metric.name().replace('_', " "),
                    metric.unit()
                ),
                String::new(),
                Vec::new(),
            )
        }
    };
    Finding {
        problem,
        metric,
        severity,
        category: metric.category(),
        current_value: round_to(value, decimals),
        normal_range: range,
        percentile,
        description,
        impact,
        recommendations,
    }
}

/// Turn classified outcomes into ordered findings and a summary.
///
/// Findings are stably sorted by severity (severe first), then category, then metric
/// declaration order.
pub fn synthesize(outcomes: &[MetricOutcome], catalog: &FindingCatalog) -> (Vec<Finding>, Summary) {
    let mut findings: Vec<Finding> = outcomes
        .iter()
        .filter_map(|outcome| match *outcome {
            MetricOutcome::Classified {
                metric,
                value,
                percentile,
                severity,
                normal_range,
            } if severity != Severity::None => Some(build_finding(
                metric,
                value,
                percentile,
                severity,
                normal_range,
                catalog,
            )),
            _ => None,
        })
        .collect();
    findings.sort_by_key(|f| (severity_rank(f.severity), f.category.rank(), f.metric));

    let summary = summarize(&findings);
    (findings, summary)
}

fn summarize(findings: &[Finding]) -> Summary {
    let total = findings.len();
    let severe = findings
        .iter()
        .filter(|f| f.severity == Severity::Severe)
        .count();
    let moderate = findings
        .iter()
        .filter(|f| f.severity == Severity::Moderate)
        .count();

    if total == 0 {
        return Summary {
            overall_status: OverallStatus::Normal,
            risk_level: RiskLevel::Low,
            total_findings: 0,
            severe_count: 0,
            moderate_count: 0,
            summary: "Gait parameters are within normal ranges. Continue regular physical activity to maintain mobility.".to_string(),
        };
    }

    let risk_level = if severe > 0 || total >= 4 {
        RiskLevel::High
    } else if moderate >= 3 {
        RiskLevel::Moderate
    } else {
        RiskLevel::LowModerate
    };
    let overall_status = if severe > 0 {
        OverallStatus::NeedsImmediateAttention
    } else {
        OverallStatus::NeedsImprovement
    };

    let dominant = dominant_category(findings);
    let noun = if total == 1 { "abnormality" } else { "abnormalities" };
    let summary = format!(
        "Detected {total} gait {noun}: {severe} severe, {moderate} moderate. \
         Physical therapy focusing on {} is recommended.",
        dominant.label().to_lowercase()
    );
    Summary {
        overall_status,
        risk_level,
        total_findings: total,
        severe_count: severe,
        moderate_count: moderate,
        summary,
    }
}

/// Most frequent category; ties go to the one seen first in the ordered findings.
fn dominant_category(findings: &[Finding]) -> Category {
    let mut counts: Vec<(Category, usize)> = Vec::new();
    for f in findings {
        match counts.iter_mut().find(|(c, _)| *c == f.category) {
            Some((_, n)) => *n += 1,
            None => counts.push((f.category, 1)),
        }
    }
    let mut best = counts[0];
    for &(category, n) in &counts[1..] {
        if n > best.1 {
            best = (category, n);
        }
    }
    best.0
}
