//! Failure Tracker — categorizes failures across Ralph Wiggum iterations and
//! derives monotonic strategy adjustments from the accumulated pattern.
//! "Failures are data": each record nudges the current strategy rather than
//! triggering a blind retry.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::error::FailureType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    pub iteration: u32,
    pub failure_type: FailureType,
    pub message: String,
    pub timestamp: String,
    pub details: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyAdjustment {
    pub parameter: String,
    pub old_value: String,
    pub new_value: String,
    pub reason: String,
}

/// The six tunables the pipeline adjusts based on observed failure
/// patterns. Deltas apply monotonically — once nudged, a value never
/// reverses within a tracker's lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Strategy {
    pub search_depth: u8,
    pub require_exact_match: bool,
    pub fallback_to_ast: bool,
    pub timeout_seconds: u32,
    pub retry_external_services: bool,
    pub min_confidence: f64,
}

impl Default for Strategy {
    fn default() -> Self {
        Self {
            search_depth: 1,
            require_exact_match: false,
            fallback_to_ast: false,
            timeout_seconds: 10,
            retry_external_services: true,
            min_confidence: 0.7,
        }
    }
}

#[derive(Debug, Default)]
pub struct FailureTracker {
    failures: Vec<FailureRecord>,
    strategy: Strategy,
    /// Failure counts observed the last time each numeric delta fired, so a
    /// repeat call with an unchanged count does not re-escalate — only a
    /// freshly recorded failure of that kind earns another step.
    search_depth_baseline: usize,
    timeout_baseline: usize,
}

impl FailureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, failure: FailureRecord) {
        self.failures.push(failure);
    }

    /// Classify and record an arbitrary component error, mirroring
    /// `FailureType::classify`'s downcast cascade.
    pub fn record_from_error(
        &mut self,
        iteration: u32,
        err: &(dyn std::error::Error + 'static),
    ) -> FailureRecord {
        let mut details = HashMap::new();
        details.insert("error_debug".to_string(), format!("{err:?}"));
        let record = FailureRecord {
            iteration,
            failure_type: FailureType::classify(err),
            message: err.to_string(),
            timestamp: now_iso(),
            details,
        };
        self.record(record.clone());
        record
    }

    pub fn get_failure_counts(&self) -> HashMap<FailureType, usize> {
        let mut counts = HashMap::new();
        for f in &self.failures {
            *counts.entry(f.failure_type).or_insert(0) += 1;
        }
        counts
    }

    pub fn get_dominant_failure(&self) -> Option<FailureType> {
        self.get_failure_counts()
            .into_iter()
            .max_by_key(|(_, count)| *count)
            .map(|(kind, _)| kind)
    }

    fn count(&self, kind: FailureType) -> usize {
        self.failures.iter().filter(|f| f.failure_type == kind).count()
    }

    /// Apply any new threshold-triggered deltas and return only the ones
    /// made this call (adjustments already applied in a prior call are not
    /// repeated).
    pub fn suggest_adjustments(&mut self) -> Vec<StrategyAdjustment> {
        let mut adjustments = Vec::new();

        let source_not_found = self.count(FailureType::SourceNotFound);
        if source_not_found >= 2 && source_not_found > self.search_depth_baseline {
            self.search_depth_baseline = source_not_found;
            let new_depth = (self.strategy.search_depth + 1).min(5);
            if new_depth != self.strategy.search_depth {
                adjustments.push(StrategyAdjustment {
                    parameter: "search_depth".to_string(),
                    old_value: self.strategy.search_depth.to_string(),
                    new_value: new_depth.to_string(),
                    reason: format!("{source_not_found} source-not-found failures"),
                });
                self.strategy.search_depth = new_depth;
            }
        }

        let sandbox_failed = self.count(FailureType::SandboxFailed);
        if sandbox_failed >= 3 && !self.strategy.fallback_to_ast {
            adjustments.push(StrategyAdjustment {
                parameter: "fallback_to_ast".to_string(),
                old_value: "false".to_string(),
                new_value: "true".to_string(),
                reason: format!("{sandbox_failed} sandbox failures"),
            });
            self.strategy.fallback_to_ast = true;
        }

        let low_confidence = self.count(FailureType::LowConfidence);
        if low_confidence >= 2 && !self.strategy.require_exact_match {
            adjustments.push(StrategyAdjustment {
                parameter: "require_exact_match".to_string(),
                old_value: "false".to_string(),
                new_value: "true".to_string(),
                reason: format!("{low_confidence} low-confidence failures"),
            });
            self.strategy.require_exact_match = true;
        }

        let timeouts = self.count(FailureType::Timeout);
        if timeouts >= 2 && timeouts > self.timeout_baseline {
            self.timeout_baseline = timeouts;
            let new_timeout = (self.strategy.timeout_seconds * 2).min(60);
            if new_timeout != self.strategy.timeout_seconds {
                adjustments.push(StrategyAdjustment {
                    parameter: "timeout_seconds".to_string(),
                    old_value: self.strategy.timeout_seconds.to_string(),
                    new_value: new_timeout.to_string(),
                    reason: format!("{timeouts} timeout failures"),
                });
                self.strategy.timeout_seconds = new_timeout;
            }
        }

        let external = self.count(FailureType::ExternalService);
        if external >= 3 && self.strategy.retry_external_services {
            adjustments.push(StrategyAdjustment {
                parameter: "retry_external_services".to_string(),
                old_value: "true".to_string(),
                new_value: "false".to_string(),
                reason: format!("{external} external service failures"),
            });
            self.strategy.retry_external_services = false;
        }

        adjustments
    }

    pub fn get_adjusted_strategy(&mut self) -> Strategy {
        self.suggest_adjustments();
        self.strategy.clone()
    }

    pub fn generate_report(&mut self) -> String {
        let mut lines = Vec::new();
        let banner = "=".repeat(60);
        lines.push(banner.clone());
        lines.push("FAILURE ANALYSIS REPORT".to_string());
        lines.push(banner.clone());
        lines.push(String::new());
        lines.push(format!("Total Failures: {}", self.failures.len()));
        lines.push(String::new());
        lines.push("Failure Type Breakdown:".to_string());

        let mut counts: Vec<(FailureType, usize)> = self.get_failure_counts().into_iter().collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        for (kind, count) in counts {
            lines.push(format!("  - {kind}: {count}"));
        }

        lines.push(String::new());
        lines.push("Strategy Adjustments Made:".to_string());
        let adjustments = self.suggest_adjustments();
        if adjustments.is_empty() {
            lines.push("  (none)".to_string());
        } else {
            for adj in &adjustments {
                lines.push(format!("  - {}: {} -> {}", adj.parameter, adj.old_value, adj.new_value));
                lines.push(format!("    Reason: {}", adj.reason));
            }
        }

        lines.push(String::new());
        lines.push("Current Strategy:".to_string());
        lines.push(format!("  - search_depth: {}", self.strategy.search_depth));
        lines.push(format!("  - require_exact_match: {}", self.strategy.require_exact_match));
        lines.push(format!("  - fallback_to_ast: {}", self.strategy.fallback_to_ast));
        lines.push(format!("  - timeout_seconds: {}", self.strategy.timeout_seconds));
        lines.push(format!(
            "  - retry_external_services: {}",
            self.strategy.retry_external_services
        ));
        lines.push(format!("  - min_confidence: {}", self.strategy.min_confidence));
        lines.push(String::new());
        lines.push(banner);

        lines.join("\n")
    }

    pub fn reset(&mut self) {
        self.failures.clear();
        self.strategy = Strategy::default();
        self.search_depth_baseline = 0;
        self.timeout_baseline = 0;
    }
}

fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339()
}
