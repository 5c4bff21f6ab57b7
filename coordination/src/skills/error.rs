//! Error taxonomy for the zero-hallucination skill pipeline.
//!
//! Each component boundary either propagates one of these via `?`, or folds
//! the error into a structured result type (`AuditResult`, `DDRResult`,
//! `LoopResult`) rather than raising further — see `skills::workflow`.

use thiserror::Error;

/// Errors raised while validating a claimed symbol against source evidence.
#[derive(Debug, Error)]
pub enum ValidatorError {
    #[error("source file not found: {0}")]
    SourceNotFound(String),
    #[error("failed to read {file}: {reason}")]
    ReadFailed { file: String, reason: String },
    #[error("no evidence source could handle extension {0:?}")]
    NoHandler(Option<String>),
}

/// Raised when `HallMetric::record_and_check` crosses the configured threshold.
#[derive(Debug, Error)]
#[error(
    "hallucination rate {rate:.4} exceeded threshold {threshold:.4} ({rejected}/{total} rejected)"
)]
pub struct HallMetricExceeded {
    pub rate: f64,
    pub threshold: f64,
    pub rejected: u64,
    pub total: u64,
}

/// Errors from the Direct Dependency Retriever.
#[derive(Debug, Error)]
pub enum DdrError {
    #[error("hallucination threshold exceeded during retrieval")]
    HallucinationExceeded(#[from] HallMetricExceeded),
    #[error("catalog index is empty")]
    EmptyCatalog,
}

/// Errors from claim auditing.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("hallucination threshold exceeded during audit")]
    HallucinationExceeded(#[from] HallMetricExceeded),
    #[error("no claims could be extracted from content")]
    NoClaims,
}

/// Errors from the LLM client (raw HTTP provider adapters).
#[derive(Debug, Error)]
pub enum LlmClientError {
    #[error("missing API key for provider {0}")]
    MissingApiKey(String),
    #[error("request to {provider} failed: {message}")]
    RequestFailed { provider: String, message: String },
    #[error("response from {0} could not be parsed")]
    ParseError(String),
    #[error("request to {0} timed out")]
    Timeout(String),
    #[error("rate limited by {provider}, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<std::time::Duration>,
    },
    #[error("reasoning budget exhausted and no fallback available")]
    BudgetExhaustedNoFallback,
}

/// Errors surfaced while a sandbox/graph-storage/search collaborator is consulted.
#[derive(Debug, Error)]
pub enum ExternalServiceError {
    #[error("{service} returned HTTP {status}: {body}")]
    HttpStatus {
        service: String,
        status: u16,
        body: String,
    },
    #[error("{service} request failed: {detail}")]
    Transport { service: String, detail: String },
    #[error("{0} timed out")]
    Timeout(String),
}

/// Configuration errors — fatal at startup, never raised mid-run.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
    #[error("failed to create data directory {path}: {reason}")]
    DataDirUnwritable { path: String, reason: String },
}

/// Classification used by the Failure Tracker (`skills::failure_tracker`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureType {
    SourceNotFound,
    SandboxFailed,
    LowConfidence,
    Hallucination,
    Timeout,
    ExternalService,
    Unknown,
}

impl std::fmt::Display for FailureType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::SourceNotFound => "source_not_found",
            Self::SandboxFailed => "sandbox_failed",
            Self::LowConfidence => "low_confidence",
            Self::Hallucination => "hallucination",
            Self::Timeout => "timeout",
            Self::ExternalService => "external_service",
            Self::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

impl FailureType {
    /// Classify a component error into a `FailureType`, mirroring the
    /// isinstance cascade the pipeline historically used to triage
    /// exceptions before routing them to the `FailureTracker`.
    pub fn classify(err: &(dyn std::error::Error + 'static)) -> Self {
        if err.downcast_ref::<ValidatorError>().is_some() {
            return Self::SourceNotFound;
        }
        if err.downcast_ref::<ExternalServiceError>().is_some() {
            return Self::ExternalService;
        }
        if err.downcast_ref::<HallMetricExceeded>().is_some() {
            return Self::Hallucination;
        }
        let msg = err.to_string().to_lowercase();
        if msg.contains("sandbox") {
            return Self::SandboxFailed;
        }
        if msg.contains("confidence") {
            return Self::LowConfidence;
        }
        if msg.contains("hallucin") || msg.contains("ungrounded") {
            return Self::Hallucination;
        }
        if msg.contains("timeout") || msg.contains("timed out") {
            return Self::Timeout;
        }
        Self::Unknown
    }
}

/// Errors returned (not raised) inside `LoopResult` — see `skills::ralph_wiggum`.
#[derive(Debug, Error)]
pub enum IterationError {
    #[error("loop exhausted {0} iterations without satisfying completion promises")]
    MaxIterationsExceeded(u32),
    #[error("completion promise {0:?} was not met")]
    CompletionPromiseNotMet(Vec<String>),
}
