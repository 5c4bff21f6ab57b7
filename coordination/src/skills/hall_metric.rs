//! Hallucination rate (`Hall_m`) tracking with a fail-fast threshold.
//!
//! Owned exclusively by a single pipeline run; mutation is serialized behind
//! a `Mutex` so `get_summary()` always observes an internally consistent
//! snapshot of totals and rate.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::error::HallMetricExceeded;

/// One `record()` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HallRecord {
    pub validated: u64,
    pub rejected: u64,
    pub operation: String,
    pub context: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HallSummary {
    pub observations: usize,
    pub cumulative_hall_m: f64,
    pub threshold: f64,
    pub validated_total: u64,
    pub rejected_total: u64,
}

#[derive(Debug)]
struct Inner {
    records: Vec<HallRecord>,
    validated_total: u64,
    rejected_total: u64,
}

/// Cumulative, threshold-gated hallucination-rate tracker.
pub struct HallMetric {
    threshold: f64,
    inner: Mutex<Inner>,
}

impl HallMetric {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            inner: Mutex::new(Inner {
                records: Vec::new(),
                validated_total: 0,
                rejected_total: 0,
            }),
        }
    }

    pub fn with_default_threshold() -> Self {
        Self::new(0.02)
    }

    fn cumulative_rate(validated_total: u64, rejected_total: u64) -> f64 {
        let denom = validated_total + rejected_total;
        if denom == 0 {
            0.0
        } else {
            rejected_total as f64 / denom as f64
        }
    }

    /// Append a record and update totals; never fails.
    pub fn record(&self, validated: u64, rejected: u64, operation: &str, context: Option<&str>) {
        let mut inner = self.inner.lock().expect("hall metric lock poisoned");
        inner.validated_total += validated;
        inner.rejected_total += rejected;
        inner.records.push(HallRecord {
            validated,
            rejected,
            operation: operation.to_string(),
            context: context.map(|c| c.to_string()),
        });
    }

    /// As `record`, but raise `HallMetricExceeded` if the cumulative rate
    /// reaches or exceeds `threshold` and `fail_on_exceed` is set.
    pub fn record_and_check(
        &self,
        validated: u64,
        rejected: u64,
        operation: &str,
        context: Option<&str>,
        fail_on_exceed: bool,
    ) -> Result<(), HallMetricExceeded> {
        self.record(validated, rejected, operation, context);
        let (rate, validated_total, rejected_total) = {
            let inner = self.inner.lock().expect("hall metric lock poisoned");
            (
                Self::cumulative_rate(inner.validated_total, inner.rejected_total),
                inner.validated_total,
                inner.rejected_total,
            )
        };
        if rate >= self.threshold {
            tracing::warn!(rate, threshold = self.threshold, "hallucination rate crossed threshold");
            if fail_on_exceed {
                return Err(HallMetricExceeded {
                    rate,
                    threshold: self.threshold,
                    rejected: rejected_total,
                    total: validated_total + rejected_total,
                });
            }
        }
        Ok(())
    }

    pub fn get_summary(&self) -> HallSummary {
        let inner = self.inner.lock().expect("hall metric lock poisoned");
        HallSummary {
            observations: inner.records.len(),
            cumulative_hall_m: Self::cumulative_rate(inner.validated_total, inner.rejected_total),
            threshold: self.threshold,
            validated_total: inner.validated_total,
            rejected_total: inner.rejected_total,
        }
    }

    pub fn reset(&self) {
        let mut inner = self.inner.lock().expect("hall metric lock poisoned");
        inner.records.clear();
        inner.validated_total = 0;
        inner.rejected_total = 0;
    }
}

impl Default for HallMetric {
    fn default() -> Self {
        Self::with_default_threshold()
    }
}
