//! Ralph Wiggum Loop — an autonomous iteration loop generic over a result
//! type `T`: run `task(strategy)`, check completion promises, record
//! failures, adjust strategy, and retry until success or `max_iterations`.
//! Named for the philosophy it encodes: iteration over perfection, failures
//! as data. Mirrors the tiered correction loop's escalation-trigger style
//! for its cooperative abort handle.

use std::error::Error as StdError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use super::failure_tracker::{FailureRecord, FailureTracker, Strategy};
use super::promises::{PromiseResult, PromiseSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopStatus {
    Running,
    Success,
    MaxIterations,
    Aborted,
}

#[derive(Debug, Clone)]
pub struct IterationResult<T> {
    pub iteration: u32,
    pub value: Option<T>,
    pub success: bool,
    pub promise_results: Vec<PromiseResult>,
    pub error: Option<String>,
    pub duration_ms: u64,
    pub strategy: Strategy,
}

#[derive(Debug, Clone)]
pub struct LoopResult<T> {
    pub status: LoopStatus,
    pub value: Option<T>,
    pub total_iterations: u32,
    pub successful_iteration: Option<u32>,
    pub all_iterations: Vec<IterationResult<T>>,
    pub final_strategy: Strategy,
    pub failure_report: String,
}

impl<T> LoopResult<T> {
    pub fn success(&self) -> bool {
        self.status == LoopStatus::Success
    }
}

/// Handle returned alongside the loop so a caller can request cooperative
/// cancellation; checked only between iterations, never mid-task.
#[derive(Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct RalphWiggumLoop<T> {
    max_iterations: u32,
    promises: PromiseSet<T>,
    initial_strategy: Strategy,
    failure_tracker: FailureTracker,
    abort_handle: AbortHandle,
}

impl<T: Clone> RalphWiggumLoop<T> {
    pub fn new(max_iterations: u32, promises: PromiseSet<T>) -> Self {
        Self {
            max_iterations,
            promises,
            initial_strategy: Strategy::default(),
            failure_tracker: FailureTracker::new(),
            abort_handle: AbortHandle::default(),
        }
    }

    pub fn with_initial_strategy(mut self, strategy: Strategy) -> Self {
        self.initial_strategy = strategy;
        self
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort_handle.clone()
    }

    /// Run until a successful iteration, exhaustion, or external abort.
    /// `task` should return `Err` on failure rather than panicking; a panic
    /// inside `task` is not caught here (only promise checks are).
    pub fn run<E, F, OnIter, OnStrategy>(
        &mut self,
        mut task: F,
        mut on_iteration: OnIter,
        mut on_strategy_change: OnStrategy,
    ) -> LoopResult<T>
    where
        E: StdError,
        F: FnMut(&Strategy) -> Result<T, E>,
        OnIter: FnMut(&IterationResult<T>),
        OnStrategy: FnMut(&Strategy),
    {
        self.failure_tracker.reset();
        let mut iterations: Vec<IterationResult<T>> = Vec::new();
        let mut current = 0u32;
        let mut status = LoopStatus::Running;
        let mut success_value: Option<T> = None;
        let mut successful_iteration: Option<u32> = None;

        while current < self.max_iterations {
            if self.abort_handle.is_aborted() {
                status = LoopStatus::Aborted;
                break;
            }
            current += 1;

            let strategy = self.failure_tracker.get_adjusted_strategy();
            let result = self.execute_iteration(&mut task, current, &strategy);
            on_iteration(&result);

            if result.success {
                success_value = result.value.clone();
                successful_iteration = Some(current);
                iterations.push(result);
                status = LoopStatus::Success;
                break;
            }

            if let Some(error) = &result.error {
                self.failure_tracker.record(FailureRecord {
                    iteration: current,
                    failure_type: classify_message(error),
                    message: error.clone(),
                    timestamp: chrono::Utc::now().to_rfc3339(),
                    details: Default::default(),
                });
            } else {
                self.failure_tracker.record(FailureRecord {
                    iteration: current,
                    failure_type: classify_promise_failure(&result.promise_results),
                    message: summarize_promise_failures(&result.promise_results),
                    timestamp: chrono::Utc::now().to_rfc3339(),
                    details: Default::default(),
                });
            }

            iterations.push(result);

            let adjustments = self.failure_tracker.suggest_adjustments();
            if !adjustments.is_empty() {
                on_strategy_change(&self.failure_tracker.get_adjusted_strategy());
            }
        }

        if status == LoopStatus::Running {
            status = LoopStatus::MaxIterations;
        }

        LoopResult {
            status,
            value: success_value,
            total_iterations: current,
            successful_iteration,
            all_iterations: iterations,
            final_strategy: self.failure_tracker.get_adjusted_strategy(),
            failure_report: self.failure_tracker.generate_report(),
        }
    }

    fn execute_iteration<E, F>(&self, task: &mut F, iteration: u32, strategy: &Strategy) -> IterationResult<T>
    where
        E: StdError,
        F: FnMut(&Strategy) -> Result<T, E>,
    {
        let start = Instant::now();
        match task(strategy) {
            Ok(value) => {
                let (success, promise_results) = if self.promises.promises.is_empty() {
                    (true, Vec::new())
                } else {
                    self.promises.evaluate(&value)
                };
                IterationResult {
                    iteration,
                    value: Some(value),
                    success,
                    promise_results,
                    error: None,
                    duration_ms: start.elapsed().as_millis() as u64,
                    strategy: strategy.clone(),
                }
            }
            Err(e) => IterationResult {
                iteration,
                value: None,
                success: false,
                promise_results: Vec::new(),
                error: Some(e.to_string()),
                duration_ms: start.elapsed().as_millis() as u64,
                strategy: strategy.clone(),
            },
        }
    }
}

fn classify_message(message: &str) -> super::error::FailureType {
    use super::error::FailureType;
    let lower = message.to_lowercase();
    if lower.contains("sandbox") {
        FailureType::SandboxFailed
    } else if lower.contains("confidence") {
        FailureType::LowConfidence
    } else if lower.contains("hallucin") || lower.contains("ungrounded") {
        FailureType::Hallucination
    } else if lower.contains("timeout") || lower.contains("timed out") {
        FailureType::Timeout
    } else if lower.contains("source") || lower.contains("file") {
        FailureType::SourceNotFound
    } else {
        FailureType::Unknown
    }
}

fn classify_promise_failure(results: &[PromiseResult]) -> super::error::FailureType {
    use super::error::FailureType;
    for result in results {
        if result.passed {
            continue;
        }
        let message = result.reason.as_deref().unwrap_or_default().to_lowercase();
        if message.contains("source") || message.contains("file") {
            return FailureType::SourceNotFound;
        }
        if message.contains("sandbox") {
            return FailureType::SandboxFailed;
        }
        if message.contains("confidence") {
            return FailureType::LowConfidence;
        }
        if message.contains("hallucin") || message.contains("ungrounded") {
            return FailureType::Hallucination;
        }
    }
    FailureType::Unknown
}

fn summarize_promise_failures(results: &[PromiseResult]) -> String {
    let failed: Vec<String> = results
        .iter()
        .filter(|r| !r.passed)
        .map(|r| r.reason.clone().unwrap_or_else(|| format!("promise '{}' failed", r.name)))
        .collect();
    if failed.is_empty() {
        "unknown failure".to_string()
    } else {
        failed.join("; ")
    }
}
