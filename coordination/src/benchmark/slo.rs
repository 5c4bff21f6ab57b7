//! SLO Definitions and Dashboard Spec
//!
//! Defines service-level objectives for swarm quality metrics and provides
//! evaluation against the [`OrchestrationMetrics`] computed by the benchmark
//! harness. Each SLO has warning and critical thresholds with alert support.
//!
//! # SLO Targets
//!
//! | Metric | Warning | Critical | Direction |
//! |---|---|---|---|
//! | Verifier first-pass rate | ≥ 0.30 | ≥ 0.20 | Higher is better |
//! | Overall success rate | ≥ 0.70 | ≥ 0.50 | Higher is better |
//! | Escalation ratio | ≤ 0.40 | ≤ 0.60 | Lower is better |
//! | P95 latency | ≤ 600s | ≤ 900s | Lower is better |
//! | Cost per closed issue | ≤ $0.50 | ≤ $1.00 | Lower is better |
//! | Stuck rate | ≤ 0.15 | ≤ 0.25 | Lower is better |
//!
//! # Dashboard Panels
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Swarm Quality Dashboard                                 │
//! ├─────────────┬─────────────┬─────────────┬──────────────┤
//! │ First-Pass  │ Success     │ Escalation  │ Stuck        │
//! │ Rate        │ Rate        │ Rate        │ Rate         │
//! │ [gauge]     │ [gauge]     │ [gauge]     │ [gauge]      │
//! ├─────────────┴─────────────┴─────────────┴──────────────┤
//! │ Latency Distribution (p50 / p95 / max)                  │
//! │ [histogram]                                             │
//! ├─────────────────────────────────────────────────────────┤
//! │ Cost per Issue (rolling avg)                            │
//! │ [time series]                                           │
//! ├─────────────────────────────────────────────────────────┤
//! │ SLO Compliance Timeline                                 │
//! │ [status timeline: green/yellow/red per SLO]             │
//! └─────────────────────────────────────────────────────────┘
//! ```

use crate::benchmark::OrchestrationMetrics;
use serde::{Deserialize, Serialize};

/// Alert severity level for SLO violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AlertSeverity {
    /// All clear — metric within target.
    Ok,
    /// Approaching SLO boundary.
    Warning,
    /// SLO violated.
    Critical,
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Warning => write!(f, "WARNING"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Direction of a metric (whether higher or lower is better).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricDirection {
    /// Higher values are better (e.g., success rate).
    HigherIsBetter,
    /// Lower values are better (e.g., latency, cost).
    LowerIsBetter,
}

/// An individual SLO target with warning and critical thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SloTarget {
    /// Human-readable name (e.g., "First-pass verifier rate").
    pub name: String,
    /// Which `OrchestrationMetrics` field this maps to.
    pub metric_field: MetricField,
    /// Warning threshold value.
    pub warning_threshold: f64,
    /// Critical threshold value.
    pub critical_threshold: f64,
    /// Whether higher or lower is better.
    pub direction: MetricDirection,
    /// Unit label for display (e.g., "%", "s", "$").
    pub unit: String,
}

impl SloTarget {
    /// Evaluate a metric value against this SLO's thresholds.
    pub fn evaluate(&self, value: f64) -> AlertSeverity {
        match self.direction {
            MetricDirection::HigherIsBetter => {
                if value >= self.warning_threshold {
                    AlertSeverity::Ok
                } else if value >= self.critical_threshold {
                    AlertSeverity::Warning
                } else {
                    AlertSeverity::Critical
                }
            }
            MetricDirection::LowerIsBetter => {
                if value <= self.warning_threshold {
                    AlertSeverity::Ok
                } else if value <= self.critical_threshold {
                    AlertSeverity::Warning
                } else {
                    AlertSeverity::Critical
                }
            }
        }
    }
}

/// Which field of `OrchestrationMetrics` an SLO maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricField {
    FirstPassRate,
    OverallSuccessRate,
    EscalationRate,
    LatencyP95,
    CostPerIssue,
    StuckRate,
}

impl std::fmt::Display for MetricField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FirstPassRate => write!(f, "first_pass_rate"),
            Self::OverallSuccessRate => write!(f, "overall_success_rate"),
            Self::EscalationRate => write!(f, "escalation_rate"),
            Self::LatencyP95 => write!(f, "latency_p95"),
            Self::CostPerIssue => write!(f, "cost_per_issue"),
            Self::StuckRate => write!(f, "stuck_rate"),
        }
    }
}

/// Result of evaluating a single SLO against live metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SloResult {
    /// The SLO target being evaluated.
    pub target: SloTarget,
    /// The observed metric value.
    pub observed: f64,
    /// Alert severity from the evaluation.
    pub severity: AlertSeverity,
}

impl SloResult {
    /// Whether this SLO is violated (warning or critical).
    pub fn is_violated(&self) -> bool {
        self.severity != AlertSeverity::Ok
    }
}

/// Aggregate SLO evaluation report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SloReport {
    /// Individual SLO results.
    pub results: Vec<SloResult>,
    /// Overall worst severity across all SLOs.
    pub overall_severity: AlertSeverity,
    /// Number of SLOs passing.
    pub passing: usize,
    /// Number of SLOs at warning.
    pub warnings: usize,
    /// Number of SLOs at critical.
    pub critical: usize,
}

impl SloReport {
    /// Whether all SLOs are passing.
    pub fn all_passing(&self) -> bool {
        self.overall_severity == AlertSeverity::Ok
    }

    /// Format as a human-readable summary.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        lines.push(format!(
            "SLO Report: {} passing, {} warning, {} critical [{}]",
            self.passing, self.warnings, self.critical, self.overall_severity,
        ));
        lines.push(String::new());

        for r in &self.results {
            let status = match r.severity {
                AlertSeverity::Ok => "[PASS]",
                AlertSeverity::Warning => "[WARN]",
                AlertSeverity::Critical => "[CRIT]",
            };
            let threshold_info = match r.target.direction {
                MetricDirection::HigherIsBetter => format!(
                    "warn >= {:.2}{} / crit >= {:.2}{}",
                    r.target.warning_threshold,
                    r.target.unit,
                    r.target.critical_threshold,
                    r.target.unit,
                ),
                MetricDirection::LowerIsBetter => format!(
                    "warn <= {:.2}{} / crit <= {:.2}{}",
                    r.target.warning_threshold,
                    r.target.unit,
                    r.target.critical_threshold,
                    r.target.unit,
                ),
            };
            lines.push(format!(
                "  {} {}: {:.2}{} ({})",
                status, r.target.name, r.observed, r.target.unit, threshold_info,
            ));
        }

        lines.join("\n")
    }
}

/// The default SLO target set for the swarm.
///
/// These values are intentionally conservative for initial rollout and
/// can be tightened as the system matures.
pub fn default_slo_targets() -> Vec<SloTarget> {
    vec![
        SloTarget {
            name: "First-pass verifier rate".to_string(),
            metric_field: MetricField::FirstPassRate,
            warning_threshold: 0.30,
            critical_threshold: 0.20,
            direction: MetricDirection::HigherIsBetter,
            unit: "".to_string(),
        },
        SloTarget {
            name: "Overall success rate".to_string(),
            metric_field: MetricField::OverallSuccessRate,
            warning_threshold: 0.70,
            critical_threshold: 0.50,
            direction: MetricDirection::HigherIsBetter,
            unit: "".to_string(),
        },
        SloTarget {
            name: "Escalation ratio".to_string(),
            metric_field: MetricField::EscalationRate,
            warning_threshold: 0.40,
            critical_threshold: 0.60,
            direction: MetricDirection::LowerIsBetter,
            unit: "".to_string(),
        },
        SloTarget {
            name: "P95 latency".to_string(),
            metric_field: MetricField::LatencyP95,
            warning_threshold: 600.0,
            critical_threshold: 900.0,
            direction: MetricDirection::LowerIsBetter,
            unit: "s".to_string(),
        },
        SloTarget {
            name: "Cost per closed issue".to_string(),
            metric_field: MetricField::CostPerIssue,
            warning_threshold: 0.50,
            critical_threshold: 1.00,
            direction: MetricDirection::LowerIsBetter,
            unit: "$".to_string(),
        },
        SloTarget {
            name: "Stuck rate".to_string(),
            metric_field: MetricField::StuckRate,
            warning_threshold: 0.15,
            critical_threshold: 0.25,
            direction: MetricDirection::LowerIsBetter,
            unit: "".to_string(),
        },
    ]
}

/// Extract the relevant metric value from `OrchestrationMetrics` for a given field.
pub fn extract_metric(metrics: &OrchestrationMetrics, field: MetricField) -> f64 {
    match field {
        MetricField::FirstPassRate => metrics.first_pass_rate,
        MetricField::OverallSuccessRate => metrics.overall_success_rate,
        MetricField::EscalationRate => metrics.escalation_rate,
        MetricField::LatencyP95 => metrics.latency_p95.as_secs_f64(),
        MetricField::CostPerIssue => metrics.cost_avg,
        MetricField::StuckRate => metrics.stuck_rate,
    }
}

/// Evaluate all default SLOs against computed orchestration metrics.
pub fn evaluate_slos(metrics: &OrchestrationMetrics) -> SloReport {
    evaluate_slos_with_targets(metrics, &default_slo_targets())
}

/// Evaluate a custom set of SLO targets against computed orchestration metrics.
pub fn evaluate_slos_with_targets(
    metrics: &OrchestrationMetrics,
    targets: &[SloTarget],
) -> SloReport {
    let mut results = Vec::with_capacity(targets.len());
    let mut overall = AlertSeverity::Ok;
    let mut passing = 0;
    let mut warnings = 0;
    let mut critical = 0;

    for target in targets {
        let observed = extract_metric(metrics, target.metric_field);
        let severity = target.evaluate(observed);

        if severity > overall {
            overall = severity;
        }
        match severity {
            AlertSeverity::Ok => passing += 1,
            AlertSeverity::Warning => warnings += 1,
            AlertSeverity::Critical => critical += 1,
        }

        results.push(SloResult {
            target: target.clone(),
            observed,
            severity,
        });
    }

    SloReport {
        results,
        overall_severity: overall,
        passing,
        warnings,
        critical,
    }
}

/// Dashboard panel specification for rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardPanel {
    /// Panel title.
    pub title: String,
    /// Panel type for rendering.
    pub panel_type: PanelType,
    /// Metrics displayed in this panel.
    pub metric_fields: Vec<MetricField>,
    /// Display width (1-4 columns).
    pub width: u8,
}

/// Panel visualization type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PanelType {
    /// Single-value gauge with SLO color coding.
    Gauge,
    /// Distribution histogram (p50/p95/max).
    Histogram,
    /// Time series line chart.
    TimeSeries,
    /// Status timeline (green/yellow/red bands).
    StatusTimeline,
}

/// Dashboard layout specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSpec {
    /// Dashboard title.
    pub title: String,
    /// Ordered list of panels.
    pub panels: Vec<DashboardPanel>,
    /// Refresh interval in seconds.
    pub refresh_interval_secs: u64,
}

/// Default dashboard specification for the swarm quality dashboard.
pub fn default_dashboard_spec() -> DashboardSpec {
    DashboardSpec {
        title: "Swarm Quality Dashboard".to_string(),
        refresh_interval_secs: 60,
        panels: vec![
            DashboardPanel {
                title: "First-Pass Rate".to_string(),
                panel_type: PanelType::Gauge,
                metric_fields: vec![MetricField::FirstPassRate],
                width: 1,
            },
            DashboardPanel {
                title: "Success Rate".to_string(),
                panel_type: PanelType::Gauge,
                metric_fields: vec![MetricField::OverallSuccessRate],
                width: 1,
            },
            DashboardPanel {
                title: "Escalation Rate".to_string(),
                panel_type: PanelType::Gauge,
                metric_fields: vec![MetricField::EscalationRate],
                width: 1,
            },
            DashboardPanel {
                title: "Stuck Rate".to_string(),
                panel_type: PanelType::Gauge,
                metric_fields: vec![MetricField::StuckRate],
                width: 1,
            },
            DashboardPanel {
                title: "Latency Distribution".to_string(),
                panel_type: PanelType::Histogram,
                metric_fields: vec![MetricField::LatencyP95],
                width: 4,
            },
            DashboardPanel {
                title: "Cost per Issue".to_string(),
                panel_type: PanelType::TimeSeries,
                metric_fields: vec![MetricField::CostPerIssue],
                width: 4,
            },
            DashboardPanel {
                title: "SLO Compliance".to_string(),
                panel_type: PanelType::StatusTimeline,
                metric_fields: vec![
                    MetricField::FirstPassRate,
                    MetricField::OverallSuccessRate,
                    MetricField::EscalationRate,
                    MetricField::LatencyP95,
                    MetricField::CostPerIssue,
                    MetricField::StuckRate,
                ],
                width: 4,
            },
        ],
    }
}
