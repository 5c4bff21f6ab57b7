//! Structured specialist response contracts and validation.
//!
//! Every specialist (planner, fixer, coder, reviewer) produces a response that
//! the orchestrator must parse into a typed contract before consuming. Malformed
//! responses are rejected (fail-closed) and trigger escalation or retry.
//!
//! ## Contract schema
//!
//! ```text
//! SpecialistResponse {
//!     objective_status: Success | Partial | Failed | Blocked,
//!     patch_plan:       Option<ImplementationPlan>,   // planner output
//!     risks:            Vec<Risk>,                    // identified risks
//!     required_followups: Vec<Followup>,              // what still needs work
//!     files_changed:    Vec<String>,                  // files modified
//!     raw_response:     String,                       // original text
//!     schema_valid:     bool,                         // false → fail-closed
//! }
//! ```

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::agents::reviewer::ReviewResult;
use crate::pipeline::ImplementationPlan;

/// Status of the specialist's objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveStatus {
    /// Specialist completed its objective fully.
    Success,
    /// Partially complete — some work done but followups needed.
    Partial,
    /// Could not complete — needs escalation or different approach.
    Failed,
    /// Blocked on an external dependency or unresolvable issue.
    Blocked,
}

impl std::fmt::Display for ObjectiveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Partial => write!(f, "partial"),
            Self::Failed => write!(f, "failed"),
            Self::Blocked => write!(f, "blocked"),
        }
    }
}

/// A risk identified by a specialist.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Risk {
    pub severity: RiskSeverity,
    pub description: String,
    pub file: Option<String>,
}

/// Risk severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RiskSeverity {
    Low,
    Medium,
    High,
}

/// A required followup action.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Followup {
    pub action: String,
    pub target: FollowupTarget,
}

/// Which specialist should handle a followup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FollowupTarget {
    Planner,
    Fixer,
    Coder,
    Reviewer,
    Verifier,
    Human,
}

impl std::fmt::Display for FollowupTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Planner => write!(f, "planner"),
            Self::Fixer => write!(f, "fixer"),
            Self::Coder => write!(f, "coder"),
            Self::Reviewer => write!(f, "reviewer"),
            Self::Verifier => write!(f, "verifier"),
            Self::Human => write!(f, "human"),
        }
    }
}

/// Unified typed output from any specialist.
///
/// The orchestrator MUST parse raw responses into this struct before making
/// routing decisions. Invalid/unparseable responses produce `schema_valid: false`
/// and `objective_status: Failed` (fail-closed).
#[derive(Debug, Clone)]
pub struct SpecialistResponse {
    /// How the specialist fared on its objective.
    pub objective_status: ObjectiveStatus,
    /// Structured plan (only present for planner responses).
    pub patch_plan: Option<ImplementationPlan>,
    /// Risks identified by the specialist.
    pub risks: Vec<Risk>,
    /// What still needs to be done.
    pub required_followups: Vec<Followup>,
    /// Files mentioned as changed or relevant.
    pub files_changed: Vec<String>,
    /// The raw response text.
    pub raw_response: String,
    /// Whether the response conformed to the expected schema.
    pub schema_valid: bool,
}

impl SpecialistResponse {
    /// Create a fail-closed response for unparseable output.
    pub fn fail_closed(raw: String) -> Self {
        Self {
            objective_status: ObjectiveStatus::Failed,
            patch_plan: None,
            risks: vec![Risk {
                severity: RiskSeverity::High,
                description: "Specialist response failed schema validation".into(),
                file: None,
            }],
            required_followups: vec![Followup {
                action: "Retry with clearer instructions or escalate".into(),
                target: FollowupTarget::Human,
            }],
            files_changed: Vec::new(),
            raw_response: raw,
            schema_valid: false,
        }
    }

    /// Check if this response indicates the objective was fully achieved.
    pub fn is_success(&self) -> bool {
        self.objective_status == ObjectiveStatus::Success && self.schema_valid
    }

    /// Check if this response needs followup work.
    pub fn needs_followup(&self) -> bool {
        !self.required_followups.is_empty()
    }

    /// Check if this response indicates the specialist is blocked.
    pub fn is_blocked(&self) -> bool {
        self.objective_status == ObjectiveStatus::Blocked
    }
}

// ---------------------------------------------------------------------------
// Parsers — one per specialist type
// ---------------------------------------------------------------------------

/// Parse a planner response into a typed contract.
///
/// The planner is expected to return strict JSON matching `ImplementationPlan`.
/// On parse failure: fail-closed (schema_valid=false, status=Failed).
pub fn parse_planner_response(raw: &str) -> SpecialistResponse {
    // Try to extract JSON from response (may have surrounding text)
    let json_str = extract_json_block(raw).unwrap_or(raw);

    match serde_json::from_str::<ImplementationPlan>(json_str) {
        Ok(plan) => {
            // Validate plan bounds
            if plan.steps.is_empty() {
                return SpecialistResponse {
                    objective_status: ObjectiveStatus::Failed,
                    patch_plan: None,
                    risks: vec![Risk {
                        severity: RiskSeverity::Medium,
                        description: "Plan has no steps".into(),
                        file: None,
                    }],
                    required_followups: vec![Followup {
                        action: "Re-plan with specific steps".into(),
                        target: FollowupTarget::Planner,
                    }],
                    files_changed: Vec::new(),
                    raw_response: raw.to_string(),
                    schema_valid: false,
                };
            }

            let risks = plan_risks(&plan);
            let files = plan.target_files.clone();

            SpecialistResponse {
                objective_status: ObjectiveStatus::Success,
                patch_plan: Some(plan),
                risks,
                required_followups: vec![Followup {
                    action: "Implement the plan".into(),
                    target: FollowupTarget::Fixer,
                }],
                files_changed: files,
                raw_response: raw.to_string(),
                schema_valid: true,
            }
        }
        Err(_) => SpecialistResponse::fail_closed(raw.to_string()),
    }
}

/// Parse a fixer or coder response into a typed contract.
///
/// Fixer/coder agents return freeform text describing what they did.
/// We extract status from known patterns (BLOCKED, DISCOVERED, etc.).
pub fn parse_coder_response(raw: &str) -> SpecialistResponse {
    let status = infer_status_from_text(raw);
    let files = extract_file_paths(raw);
    let followups = infer_followups_from_text(raw);
    let risks = infer_risks_from_text(raw);

    SpecialistResponse {
        objective_status: status,
        patch_plan: None,
        risks,
        required_followups: followups,
        files_changed: files,
        raw_response: raw.to_string(),
        // Coder responses are freeform — always considered valid if non-empty
        schema_valid: !raw.trim().is_empty(),
    }
}

/// Parse a reviewer response into a typed contract.
///
/// Delegates to the existing `ReviewResult::parse()` fail-closed parser,
/// then wraps into the unified contract.
pub fn parse_reviewer_response(raw: &str) -> SpecialistResponse {
    let review = ReviewResult::parse(raw);

    let status = if review.passed {
        ObjectiveStatus::Success
    } else if !review.schema_valid {
        ObjectiveStatus::Failed
    } else {
        ObjectiveStatus::Partial
    };

    let risks: Vec<Risk> = review
        .blocking_issues
        .iter()
        .map(|issue| Risk {
            severity: RiskSeverity::High,
            description: issue.clone(),
            file: None,
        })
        .collect();

    let followups = if review.passed {
        vec![Followup {
            action: "Proceed to merge".into(),
            target: FollowupTarget::Verifier,
        }]
    } else {
        vec![Followup {
            action: review.suggested_next_action.clone(),
            target: if review.schema_valid {
                FollowupTarget::Fixer
            } else {
                FollowupTarget::Reviewer
            },
        }]
    };

    SpecialistResponse {
        objective_status: status,
        patch_plan: None,
        risks,
        required_followups: followups,
        files_changed: review.touched_files,
        raw_response: raw.to_string(),
        schema_valid: review.schema_valid,
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate that a specialist response meets minimum contract requirements.
///
/// Fail-closed: returns `false` for any contract violation.
pub fn validate_response(response: &SpecialistResponse) -> Vec<String> {
    let mut violations = Vec::new();

    if !response.schema_valid {
        violations.push("Response failed schema validation".into());
    }

    if response.raw_response.trim().is_empty() {
        violations.push("Empty raw response".into());
    }

    // Success requires no high-severity risks
    if response.objective_status == ObjectiveStatus::Success {
        let has_high_risk = response
            .risks
            .iter()
            .any(|r| r.severity == RiskSeverity::High);
        if has_high_risk {
            violations.push("Success status with high-severity risk".into());
        }
    }

    // Failed/Blocked should have followups
    if matches!(
        response.objective_status,
        ObjectiveStatus::Failed | ObjectiveStatus::Blocked
    ) && response.required_followups.is_empty()
    {
        violations.push("Failed/Blocked status without followup actions".into());
    }

    violations
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Try to extract a JSON block from a response that may contain surrounding text.
fn extract_json_block(text: &str) -> Option<&str> {
    // Look for ```json ... ``` fenced blocks
    if let Some(start) = text.find("```json") {
        let json_start = start + 7;
        if let Some(end) = text[json_start..].find("```") {
            return Some(text[json_start..json_start + end].trim());
        }
    }

    // Look for first { to last }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end > start {
        Some(&text[start..=end])
    } else {
        None
    }
}

/// Convert plan risk level to contract risks.
fn plan_risks(plan: &ImplementationPlan) -> Vec<Risk> {
    use crate::pipeline::PlanRisk;
    match plan.risk {
        PlanRisk::High => vec![Risk {
            severity: RiskSeverity::High,
            description: "Plan assessed as high risk".into(),
            file: None,
        }],
        PlanRisk::Medium => vec![Risk {
            severity: RiskSeverity::Medium,
            description: "Plan assessed as medium risk".into(),
            file: None,
        }],
        PlanRisk::Low => vec![],
    }
}

/// Infer objective status from freeform coder response text.
fn infer_status_from_text(text: &str) -> ObjectiveStatus {
    let upper = text.to_uppercase();

    if upper.contains("BLOCKED") {
        return ObjectiveStatus::Blocked;
    }

    // Check for explicit failure indicators
    if upper.contains("COULD NOT") || upper.contains("UNABLE TO") || upper.contains("FAILED TO") {
        return ObjectiveStatus::Failed;
    }

    // Check for partial completion indicators
    if upper.contains("PARTIAL") || upper.contains("DISCOVERED:") || upper.contains("TODO:") {
        return ObjectiveStatus::Partial;
    }

    // Default: if the response is non-empty, assume success (coder made edits)
    if !text.trim().is_empty() {
        ObjectiveStatus::Success
    } else {
        ObjectiveStatus::Failed
    }
}

/// Extract file paths mentioned in coder response text.
fn extract_file_paths(text: &str) -> Vec<String> {
    let mut files = Vec::new();
    for word in text.split_whitespace() {
        let trimmed = word.trim_matches(|c: char| {
            matches!(c, '`' | '"' | '\'' | ',' | '.' | '(' | ')' | '[' | ']')
        });
        if looks_like_file_path(trimmed) && !files.contains(&trimmed.to_string()) {
            files.push(trimmed.to_string());
        }
    }
    files
}

fn looks_like_file_path(s: &str) -> bool {
    // Must contain a dot and a slash, or end with .rs/.toml/.lock
    if s.len() < 4 {
        return false;
    }
    let has_extension = s.ends_with(".rs")
        || s.ends_with(".toml")
        || s.ends_with(".md")
        || s.ends_with(".json")
        || s.ends_with(".lock");
    let has_path_sep = s.contains('/');
    has_extension && has_path_sep
}

/// Infer followup actions from coder response patterns.
fn infer_followups_from_text(text: &str) -> Vec<Followup> {
    let mut followups = Vec::new();
    let upper = text.to_uppercase();

    if upper.contains("DISCOVERED:") {
        followups.push(Followup {
            action: "Track discovered issue".into(),
            target: FollowupTarget::Planner,
        });
    }

    if upper.contains("BLOCKED") {
        followups.push(Followup {
            action: "Resolve blocker".into(),
            target: FollowupTarget::Human,
        });
    }

    if upper.contains("TODO:") {
        followups.push(Followup {
            action: "Complete remaining TODO items".into(),
            target: FollowupTarget::Fixer,
        });
    }

    followups
}

/// Infer risks from coder response text.
fn infer_risks_from_text(text: &str) -> Vec<Risk> {
    let mut risks = Vec::new();
    let upper = text.to_uppercase();

    if upper.contains("UNSAFE") {
        risks.push(Risk {
            severity: RiskSeverity::High,
            description: "Response mentions unsafe code".into(),
            file: None,
        });
    }

    if upper.contains("BREAKING CHANGE") || upper.contains("API CHANGE") {
        risks.push(Risk {
            severity: RiskSeverity::High,
            description: "Response mentions breaking/API change".into(),
            file: None,
        });
    }

    if upper.contains("WORKAROUND") || upper.contains("HACK") {
        risks.push(Risk {
            severity: RiskSeverity::Medium,
            description: "Response uses workaround/hack".into(),
            file: None,
        });
    }

    risks
}
