//! Multi-Agent Auditor — four independent specialist agents scored and
//! combined into a weighted composite verdict. The specialists run
//! concurrently via a `JoinSet`, mirroring the deepthink mode's
//! fan-out/fan-in strategy-execution pattern; a panicking specialist is
//! logged and scored zero rather than aborting the whole audit.

use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;

use super::claims::{extractor::ClaimExtractor, ClaimAuditor};
use super::hall_metric::HallMetric;
use super::source_ref::{SourceRef, SymbolCatalog};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub category: String,
    pub severity: IssueSeverity,
    pub description: String,
    pub location: Option<String>,
    pub confidence: f64,
    pub agent: &'static str,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentAnalysis {
    pub agent_name: &'static str,
    pub issues: Vec<Issue>,
    pub passed: bool,
    pub score: f64,
    pub execution_time_ms: u64,
    /// Only populated by the documentation specialist.
    pub hallucination_rate: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinedVerdict {
    pub composite: f64,
    pub passed: bool,
    pub critical_issues: usize,
    pub high_issues: usize,
    pub analyses: Vec<AgentAnalysis>,
}

const WEIGHT_BUG: f64 = 0.30;
const WEIGHT_SMELL: f64 = 0.15;
const WEIGHT_SECURITY: f64 = 0.25;
const WEIGHT_DOCUMENTATION: f64 = 0.30;

static RE_MAGIC_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{2,}\b").unwrap());
static RE_SQL_FORMAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"execute\(\s*["'].*%s.*["']"#).unwrap());
static RE_SECRET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)(password|api_key|secret|token)\s*=\s*["'][^"']+["']"#).unwrap());

fn allowed_magic_numbers() -> &'static [&'static str] {
    &["100", "200", "404", "500", "1000"]
}

/// Runs the four specialists in parallel on one content item and joins.
pub struct MultiAgentAuditor<'a> {
    pub repo_root: Option<std::path::PathBuf>,
    pub catalog: Option<&'a SymbolCatalog>,
    pub hall_metric: &'a HallMetric,
}

impl<'a> MultiAgentAuditor<'a> {
    pub fn new(hall_metric: &'a HallMetric) -> Self {
        Self {
            repo_root: None,
            catalog: None,
            hall_metric,
        }
    }

    pub fn with_repo_root(mut self, root: impl Into<std::path::PathBuf>) -> Self {
        self.repo_root = Some(root.into());
        self
    }

    pub fn with_catalog(mut self, catalog: &'a SymbolCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub async fn audit(&self, content: &str, refs: &[SourceRef]) -> CombinedVerdict {
        let content = Arc::new(content.to_string());
        let mut join_set: JoinSet<AgentAnalysis> = JoinSet::new();

        {
            let content = content.clone();
            join_set.spawn(async move { run_bug_agent(&content) });
        }
        {
            let content = content.clone();
            join_set.spawn(async move { run_smell_agent(&content) });
        }
        {
            let content = content.clone();
            join_set.spawn(async move { run_security_agent(&content) });
        }
        {
            let content = content.clone();
            let refs = refs.to_vec();
            // Documentation agent needs the shared auditor state; since it
            // isn't Send-shared across the spawn boundary cheaply, it runs
            // the extraction/audit logic directly (no filesystem mutation,
            // so this is safe to construct fresh inside the task).
            let hall_metric = HallMetric::new(1.0);
            join_set.spawn(async move { run_documentation_agent(&content, &refs, &hall_metric) });
        }

        let mut analyses = Vec::with_capacity(4);
        while let Some(res) = join_set.join_next().await {
            match res {
                Ok(analysis) => analyses.push(analysis),
                Err(e) => {
                    tracing::warn!(error = %e, "specialist agent panicked; scoring zero");
                    analyses.push(AgentAnalysis {
                        agent_name: "unknown",
                        issues: vec![],
                        passed: false,
                        score: 0.0,
                        execution_time_ms: 0,
                        hallucination_rate: None,
                    });
                }
            }
        }

        // Record documentation's result against the caller's real metric too.
        if let Some(doc) = analyses.iter().find(|a| a.agent_name == "documentation") {
            if let Some(rate) = doc.hallucination_rate {
                let rejected = (rate * 100.0).round() as u64;
                let validated = 100u64.saturating_sub(rejected);
                self.hall_metric.record(validated, rejected, "multi_agent_audit", None);
            }
        }

        self.combine(analyses)
    }

    fn combine(&self, analyses: Vec<AgentAnalysis>) -> CombinedVerdict {
        let weight = |name: &str| -> f64 {
            match name {
                "bug" => WEIGHT_BUG,
                "smell" => WEIGHT_SMELL,
                "security" => WEIGHT_SECURITY,
                "documentation" => WEIGHT_DOCUMENTATION,
                _ => 0.0,
            }
        };

        let composite: f64 = analyses.iter().map(|a| weight(a.agent_name) * a.score).sum();

        let critical_issues = analyses
            .iter()
            .flat_map(|a| &a.issues)
            .filter(|i| i.severity == IssueSeverity::Critical)
            .count();
        let high_issues = analyses
            .iter()
            .flat_map(|a| &a.issues)
            .filter(|i| i.severity == IssueSeverity::High)
            .count();

        let documentation_passed = analyses
            .iter()
            .find(|a| a.agent_name == "documentation")
            .map(|a| a.passed)
            .unwrap_or(false);

        let passed = critical_issues == 0 && high_issues <= 2 && documentation_passed;

        CombinedVerdict {
            composite,
            passed,
            critical_issues,
            high_issues,
            analyses,
        }
    }
}

fn run_bug_agent(content: &str) -> AgentAnalysis {
    let start = Instant::now();
    let mut issues = Vec::new();

    if content.to_lowercase().contains("open(") && !content.to_lowercase().contains("try") {
        issues.push(Issue {
            category: "error_handling".to_string(),
            severity: IssueSeverity::Medium,
            description: "file operation without visible error handling".to_string(),
            location: None,
            confidence: 0.5,
            agent: "bug",
        });
    }

    let critical = issues.iter().filter(|i| i.severity == IssueSeverity::Critical).count();
    let score = if issues.is_empty() { 1.0 } else { (1.0 - 0.15 * issues.len() as f64).max(0.0) };

    AgentAnalysis {
        agent_name: "bug",
        passed: critical == 0,
        score,
        execution_time_ms: start.elapsed().as_millis() as u64,
        issues,
        hallucination_rate: None,
    }
}

fn run_smell_agent(content: &str) -> AgentAnalysis {
    let start = Instant::now();
    let mut issues = Vec::new();

    let line_count = content.lines().count();
    if line_count > 30 {
        issues.push(Issue {
            category: "smell".to_string(),
            severity: IssueSeverity::Medium,
            description: format!("example spans {line_count} lines (>30)"),
            location: None,
            confidence: 0.6,
            agent: "smell",
        });
    }

    let max_indent = content
        .lines()
        .map(|l| l.chars().take_while(|c| *c == ' ').count() / 4)
        .max()
        .unwrap_or(0);
    if max_indent > 4 {
        issues.push(Issue {
            category: "smell".to_string(),
            severity: IssueSeverity::Medium,
            description: format!("nesting depth {max_indent} exceeds 4 levels"),
            location: None,
            confidence: 0.5,
            agent: "smell",
        });
    }

    for m in RE_MAGIC_NUMBER.find_iter(content) {
        if !allowed_magic_numbers().contains(&m.as_str()) {
            issues.push(Issue {
                category: "smell".to_string(),
                severity: IssueSeverity::Low,
                description: format!("magic number {}", m.as_str()),
                location: None,
                confidence: 0.4,
                agent: "smell",
            });
        }
    }

    let high = issues.iter().filter(|i| i.severity >= IssueSeverity::High).count();
    let score = (1.0 - 0.1 * issues.len() as f64).max(0.0);

    AgentAnalysis {
        agent_name: "smell",
        passed: high == 0,
        score,
        execution_time_ms: start.elapsed().as_millis() as u64,
        issues,
        hallucination_rate: None,
    }
}

impl PartialOrd for IssueSeverity {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for IssueSeverity {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        fn rank(s: &IssueSeverity) -> u8 {
            match s {
                IssueSeverity::Low => 0,
                IssueSeverity::Medium => 1,
                IssueSeverity::High => 2,
                IssueSeverity::Critical => 3,
            }
        }
        rank(self).cmp(&rank(other))
    }
}

fn run_security_agent(content: &str) -> AgentAnalysis {
    let start = Instant::now();
    let mut issues = Vec::new();

    if RE_SQL_FORMAT.is_match(content) || content.contains("f\"SELECT") || content.contains("f'SELECT") {
        issues.push(Issue {
            category: "sql_injection".to_string(),
            severity: IssueSeverity::Critical,
            description: "SQL query built via string formatting".to_string(),
            location: None,
            confidence: 0.8,
            agent: "security",
        });
    }
    if content.contains("os.system(") || content.contains("shell=True") {
        issues.push(Issue {
            category: "command_injection".to_string(),
            severity: IssueSeverity::Critical,
            description: "shell command execution with shell interpretation enabled".to_string(),
            location: None,
            confidence: 0.8,
            agent: "security",
        });
    }
    if RE_SECRET.is_match(content) {
        issues.push(Issue {
            category: "hardcoded_secret".to_string(),
            severity: IssueSeverity::Critical,
            description: "hardcoded credential-like literal".to_string(),
            location: None,
            confidence: 0.7,
            agent: "security",
        });
    }
    for needle in ["pickle.loads", "yaml.load(", "eval(", "exec(", "__import__("] {
        if content.contains(needle) && !content.contains("yaml.safe_load") {
            issues.push(Issue {
                category: "unsafe_deserialization".to_string(),
                severity: IssueSeverity::Critical,
                description: format!("use of {needle} without a safe alternative"),
                location: None,
                confidence: 0.75,
                agent: "security",
            });
        }
    }

    let critical = issues.iter().filter(|i| i.severity == IssueSeverity::Critical).count();
    let score = if critical == 0 { 1.0 } else { 0.0 };

    AgentAnalysis {
        agent_name: "security",
        passed: critical == 0,
        score,
        execution_time_ms: start.elapsed().as_millis() as u64,
        issues,
        hallucination_rate: None,
    }
}

fn run_documentation_agent(
    content: &str,
    refs: &[SourceRef],
    scratch_metric: &HallMetric,
) -> AgentAnalysis {
    let start = Instant::now();
    let extractor = ClaimExtractor::default();
    let claims = extractor.extract(content);

    if claims.is_empty() {
        return AgentAnalysis {
            agent_name: "documentation",
            passed: true,
            score: 1.0,
            execution_time_ms: start.elapsed().as_millis() as u64,
            issues: vec![],
            hallucination_rate: Some(0.0),
        };
    }

    let auditor = ClaimAuditor::new(scratch_metric).strict(false);
    let result = match auditor.audit(&claims, refs, false) {
        Ok(r) => r,
        Err(_) => {
            return AgentAnalysis {
                agent_name: "documentation",
                passed: false,
                score: 0.0,
                execution_time_ms: start.elapsed().as_millis() as u64,
                issues: vec![],
                hallucination_rate: Some(1.0),
            }
        }
    };

    let issues = result
        .verifications
        .iter()
        .filter(|v| !v.verified)
        .map(|v| Issue {
            category: "hallucination".to_string(),
            severity: match v.claim.severity {
                super::claims::extractor::Severity::Critical => IssueSeverity::Critical,
                super::claims::extractor::Severity::High => IssueSeverity::High,
                super::claims::extractor::Severity::Medium => IssueSeverity::Medium,
                super::claims::extractor::Severity::Low => IssueSeverity::Low,
            },
            description: v
                .rejection_reason
                .clone()
                .unwrap_or_else(|| "unverified claim".to_string()),
            location: v.claim.file_cited.clone(),
            confidence: 1.0 - v.confidence,
            agent: "documentation",
        })
        .collect();

    AgentAnalysis {
        agent_name: "documentation",
        passed: result.hallucination_rate < 0.02,
        score: 1.0 - result.hallucination_rate,
        execution_time_ms: start.elapsed().as_millis() as u64,
        issues,
        hallucination_rate: Some(result.hallucination_rate),
    }
}
