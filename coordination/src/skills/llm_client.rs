//! GLM/Z.ai LLM client — a raw `reqwest` adapter in the style of the
//! council's provider adapters, generalized behind an `LlmProvider` trait,
//! with preserved-thinking conversation state, budget tracking, and a
//! generate-with-fallback cascade.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::config::SkillsFabricConfig;
use super::error::LlmClientError;

const BUDGET_EXHAUSTED_FRACTION: f64 = 0.95;
const BUDGET_GOOD_FRACTION: f64 = 0.80;
const MAX_THINKING_BUDGET: u32 = 64_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    pub system_prompt: Option<String>,
    pub user_prompt: String,
    pub max_tokens: u32,
    pub temperature: f64,
    /// When set, the provider is asked to reason with this many budget
    /// tokens before emitting its final answer (GLM `thinking` mode).
    pub thinking_budget: Option<u32>,
    /// When true, attach `{enable_thinking: true, clear_thinking: false}` so
    /// the provider retains prior reasoning across turns.
    pub preserve_thinking: bool,
}

impl LlmRequest {
    pub fn new(user_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: None,
            user_prompt: user_prompt.into(),
            max_tokens: 4096,
            temperature: 0.3,
            thinking_budget: None,
            preserve_thinking: false,
        }
    }

    pub fn with_system(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_thinking_budget(mut self, budget: u32) -> Self {
        self.thinking_budget = Some(budget);
        self
    }

    pub fn with_preserved_thinking(mut self) -> Self {
        self.preserve_thinking = true;
        self
    }

    fn with_budget(&self, budget: u32) -> Self {
        let mut next = self.clone();
        next.thinking_budget = Some(budget);
        next
    }

    fn without_thinking(&self) -> Self {
        let mut next = self.clone();
        next.thinking_budget = None;
        next.preserve_thinking = false;
        next
    }
}

/// How well the provider's reasoning pass actually went, derived from
/// thinking-budget consumption rather than asserted by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningQuality {
    Failed,
    Degraded,
    Good,
    Excellent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThinkingFailure {
    BudgetExhausted,
    EmptyThinking,
    ApiError,
    Timeout,
    MalformedResponse,
    TruncatedOutput,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt: u64,
    pub completion: u64,
    pub thinking: u64,
    pub total: u64,
    pub thinking_budget: u32,
}

impl TokenUsage {
    pub fn budget_used_fraction(&self) -> f64 {
        if self.thinking_budget == 0 {
            return 0.0;
        }
        self.thinking as f64 / self.thinking_budget as f64
    }

    pub fn budget_exhausted(&self) -> bool {
        self.budget_used_fraction() >= BUDGET_EXHAUSTED_FRACTION
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: String,
    pub thinking: Option<String>,
    pub model: String,
    pub usage: TokenUsage,
    pub response_time_ms: u64,
    pub used_fallback: bool,
    pub failure_type: Option<ThinkingFailure>,
    pub reasoning_quality: ReasoningQuality,
    pub input_cost: f64,
    pub output_cost: f64,
}

/// Per-million-token prices; configuration, not contract.
#[derive(Debug, Clone, Copy)]
pub struct CostModel {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            input_per_million: 0.0,
            output_per_million: 0.0,
        }
    }
}

impl CostModel {
    fn cost(&self, usage: &TokenUsage) -> (f64, f64) {
        let input_cost = usage.prompt as f64 * self.input_per_million / 1_000_000.0;
        let output_cost = (usage.completion + usage.thinking) as f64 * self.output_per_million / 1_000_000.0;
        (input_cost, output_cost)
    }
}

fn reasoning_quality(response: &LlmResponse) -> ReasoningQuality {
    if response.used_fallback || response.thinking.is_none() {
        return ReasoningQuality::Failed;
    }
    if response.usage.budget_exhausted() {
        return ReasoningQuality::Degraded;
    }
    if response.usage.budget_used_fraction() > BUDGET_GOOD_FRACTION {
        return ReasoningQuality::Good;
    }
    ReasoningQuality::Excellent
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmClientError>;
    fn is_configured(&self) -> bool;
}

/// The GLM/Z.ai coding endpoint, mirroring the council adapters' raw-body
/// construction and manual response-field extraction.
pub struct ZaiProvider {
    api_key: Option<String>,
    base_url: String,
    model: String,
    client: reqwest::Client,
    cost_model: CostModel,
}

impl ZaiProvider {
    pub fn from_config(cfg: &SkillsFabricConfig) -> Self {
        Self {
            api_key: cfg.zai_api_key.clone(),
            base_url: cfg.zai_base_url.clone(),
            model: cfg.glm_model.clone(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(180))
                .build()
                .expect("failed to build GLM HTTP client"),
            cost_model: CostModel::default(),
        }
    }

    pub fn with_cost_model(mut self, cost_model: CostModel) -> Self {
        self.cost_model = cost_model;
        self
    }
}

#[async_trait]
impl LlmProvider for ZaiProvider {
    fn name(&self) -> &'static str {
        "zai_glm"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmClientError> {
        let start = Instant::now();
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| LlmClientError::MissingApiKey("zai_glm".to_string()))?;

        let mut messages = Vec::new();
        if let Some(system) = &request.system_prompt {
            messages.push(serde_json::json!({"role": "system", "content": system}));
        }
        messages.push(serde_json::json!({"role": "user", "content": request.user_prompt}));

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });
        let requested_budget = request.thinking_budget.unwrap_or(0);
        if let Some(budget) = request.thinking_budget {
            body["thinking"] = serde_json::json!({"type": "enabled", "budget_tokens": budget});
        } else {
            body["thinking"] = serde_json::json!({"type": "disabled"});
        }
        if request.preserve_thinking {
            body["thinking"]["enable_thinking"] = serde_json::json!(true);
            body["thinking"]["clear_thinking"] = serde_json::json!(false);
        }

        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let provider_name = self.name();
        let response = retry_with_backoff(|| async {
            self.client
                .post(&url)
                .bearer_auth(api_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| classify_reqwest_error(provider_name, &e))
        })
        .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(LlmClientError::RateLimited {
                provider: self.name().to_string(),
                retry_after,
            });
        }
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(LlmClientError::RequestFailed {
                provider: self.name().to_string(),
                message: format!("HTTP {status}: {body_text}"),
            });
        }

        let resp_json: serde_json::Value = response
            .json()
            .await
            .map_err(|_| LlmClientError::ParseError(self.name().to_string()))?;

        let message = &resp_json["choices"][0]["message"];
        let mut content = message["content"].as_str().unwrap_or_default().to_string();
        let thinking = message["thinking"]
            .as_str()
            .or_else(|| message["reasoning_content"].as_str())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string());

        // Known provider quirk: empty content but non-empty thinking.
        if content.is_empty() {
            if let Some(t) = &thinking {
                content = t.clone();
            }
        }
        if content.is_empty() {
            return Err(LlmClientError::ParseError(self.name().to_string()));
        }

        let usage_json = &resp_json["usage"];
        let usage = TokenUsage {
            prompt: usage_json["prompt_tokens"].as_u64().unwrap_or(0),
            completion: usage_json["completion_tokens"].as_u64().unwrap_or(0),
            thinking: usage_json["thinking_tokens"].as_u64().unwrap_or(0),
            total: usage_json["total_tokens"].as_u64().unwrap_or(0),
            thinking_budget: requested_budget,
        };

        let (input_cost, output_cost) = self.cost_model.cost(&usage);

        let mut resp = LlmResponse {
            content,
            thinking,
            model: self.model.clone(),
            usage,
            response_time_ms: start.elapsed().as_millis() as u64,
            used_fallback: false,
            failure_type: None,
            reasoning_quality: ReasoningQuality::Failed,
            input_cost,
            output_cost,
        };
        resp.reasoning_quality = reasoning_quality(&resp);
        Ok(resp)
    }
}

fn classify_reqwest_error(provider: &str, err: &reqwest::Error) -> LlmClientError {
    if err.is_timeout() {
        LlmClientError::Timeout(provider.to_string())
    } else {
        LlmClientError::RequestFailed {
            provider: provider.to_string(),
            message: err.to_string(),
        }
    }
}

fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    matches!(
        status.as_u16(),
        429 | 500 | 502 | 503 | 504
    )
}

/// Exponential backoff with jitter in `[0.5, 1.5]`, shared by every HTTP
/// collaborator in the pipeline (the LLM client here; Perplexity/Brave in
/// `collaborators`).
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            max_retries: 3,
        }
    }
}

impl RetryPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        let base_ms = self.initial_delay.as_millis() as f64 * self.multiplier.powi(attempt as i32);
        let capped_ms = base_ms.min(self.max_delay.as_millis() as f64);
        let jitter = jitter_factor(attempt);
        Duration::from_millis((capped_ms * jitter) as u64)
    }
}

/// Deterministic-enough jitter derived from the attempt count and the
/// current instant's subsecond nanos — avoids pulling in a dedicated RNG
/// crate for a single bounded multiplier.
fn jitter_factor(attempt: u32) -> f64 {
    let nanos = Instant::now().elapsed().subsec_nanos() as u64;
    let seed = nanos.wrapping_add(attempt as u64 * 2_654_435_761);
    let normalized = (seed % 1000) as f64 / 1000.0;
    0.5 + normalized
}

async fn retry_with_backoff<F, Fut>(mut f: F) -> Result<reqwest::Response, LlmClientError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<reqwest::Response, LlmClientError>>,
{
    let policy = RetryPolicy::default();
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(response) if !is_retryable_status(response.status()) || attempt >= policy.max_retries => {
                return Ok(response)
            }
            Ok(response) => {
                tracing::debug!(status = %response.status(), attempt, "retrying LLM request");
                tokio::time::sleep(policy.delay_for(attempt)).await;
                attempt += 1;
            }
            Err(e @ (LlmClientError::Timeout(_) | LlmClientError::RequestFailed { .. })) if attempt < policy.max_retries => {
                tracing::debug!(error = %e, attempt, "retrying LLM request after transport error");
                tokio::time::sleep(policy.delay_for(attempt)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn classify_failure(result: &Result<LlmResponse, LlmClientError>) -> Option<ThinkingFailure> {
    match result {
        Ok(resp) if resp.thinking.is_none() && resp.usage.thinking_budget > 0 => {
            Some(ThinkingFailure::EmptyThinking)
        }
        Ok(resp) if resp.usage.budget_exhausted() => Some(ThinkingFailure::BudgetExhausted),
        Ok(resp) if resp.content.trim().is_empty() => Some(ThinkingFailure::TruncatedOutput),
        Ok(_) => None,
        Err(LlmClientError::Timeout(_)) => Some(ThinkingFailure::Timeout),
        Err(LlmClientError::ParseError(_)) => Some(ThinkingFailure::MalformedResponse),
        Err(_) => Some(ThinkingFailure::ApiError),
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct LlmClientMetrics {
    pub thinking_requests: u64,
    pub successful_thinking: u64,
    pub failed_thinking: u64,
    pub fallback_requests: u64,
    pub budget_exhausted_count: u64,
    pub empty_thinking_count: u64,
    pub api_error_count: u64,
    pub timeout_count: u64,
    pub malformed_response_count: u64,
    pub truncated_output_count: u64,
}

impl LlmClientMetrics {
    fn record_failure(&mut self, failure: ThinkingFailure) {
        self.failed_thinking += 1;
        match failure {
            ThinkingFailure::BudgetExhausted => self.budget_exhausted_count += 1,
            ThinkingFailure::EmptyThinking => self.empty_thinking_count += 1,
            ThinkingFailure::ApiError => self.api_error_count += 1,
            ThinkingFailure::Timeout => self.timeout_count += 1,
            ThinkingFailure::MalformedResponse => self.malformed_response_count += 1,
            ThinkingFailure::TruncatedOutput => self.truncated_output_count += 1,
        }
    }
}

/// Drives a primary provider through the generate-with-fallback cascade,
/// falling back to a secondary provider (or disabled-thinking retry) on
/// failure, and owning this conversation's preserved-thinking state.
///
/// Not `Sync` for shared mutation: conversation state (metrics, turn
/// history) belongs to one agent instance. Parallel workers each hold a
/// separate `LlmClient`.
pub struct LlmClient {
    primary: Box<dyn LlmProvider>,
    fallback: Option<Box<dyn LlmProvider>>,
    auto_increase_budget: bool,
    metrics: LlmClientMetrics,
}

impl LlmClient {
    pub fn new(primary: Box<dyn LlmProvider>) -> Self {
        Self {
            primary,
            fallback: None,
            auto_increase_budget: true,
            metrics: LlmClientMetrics::default(),
        }
    }

    pub fn with_fallback(mut self, fallback: Box<dyn LlmProvider>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn without_budget_auto_increase(mut self) -> Self {
        self.auto_increase_budget = false;
        self
    }

    pub fn metrics(&self) -> &LlmClientMetrics {
        &self.metrics
    }

    /// Plain single-shot completion without the fallback cascade; used when
    /// the caller doesn't want thinking at all.
    pub async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmClientError> {
        self.primary.complete(request).await
    }

    /// Attempts the thinking request once; on a budget-exhaustion failure
    /// retries with a doubled budget (capped at 64000) if configured to;
    /// otherwise re-issues with thinking disabled and marks the response
    /// `used_fallback = true`.
    pub async fn generate_with_fallback(&mut self, request: &LlmRequest) -> Result<LlmResponse, LlmClientError> {
        if request.thinking_budget.is_some() {
            self.metrics.thinking_requests += 1;
        }

        let first = self.primary.complete(request).await;
        if let Some(failure) = classify_failure(&first) {
            self.metrics.record_failure(failure);

            if failure == ThinkingFailure::BudgetExhausted && self.auto_increase_budget {
                if let Some(budget) = request.thinking_budget {
                    let doubled = (budget.saturating_mul(2)).min(MAX_THINKING_BUDGET);
                    let retried = self.primary.complete(&request.with_budget(doubled)).await;
                    if classify_failure(&retried).is_none() {
                        if let Ok(resp) = retried {
                            self.metrics.successful_thinking += 1;
                            return Ok(resp);
                        }
                    }
                }
            }

            let fallback_request = request.without_thinking();
            let fallback_result = match &self.fallback {
                Some(provider) if provider.is_configured() => provider.complete(&fallback_request).await,
                _ => self.primary.complete(&fallback_request).await,
            };
            self.metrics.fallback_requests += 1;
            return fallback_result.map(|mut resp| {
                resp.used_fallback = true;
                resp.failure_type = Some(failure);
                resp.reasoning_quality = ReasoningQuality::Failed;
                resp
            });
        }

        if request.thinking_budget.is_some() {
            self.metrics.successful_thinking += 1;
        }
        first
    }
}
