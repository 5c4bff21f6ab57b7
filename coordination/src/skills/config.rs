//! Environment-driven configuration for the skill pipeline.
//!
//! Mirrors the `HarnessConfig::from_env()` convention used elsewhere in this
//! codebase: read named environment variables, fall back to sane defaults,
//! and resolve relative paths against a base directory at the end.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::ConfigError;

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => {
            let lowered = val.to_lowercase();
            lowered == "true" || lowered == "1"
        }
        Err(_) => default,
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Resolved configuration for a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillsFabricConfig {
    /// Root directory for cached catalogs, session logs, and trees.
    pub data_dir: PathBuf,
    /// Z.ai / GLM provider base URL.
    pub zai_base_url: String,
    /// GLM model name, e.g. `glm-4.7`.
    pub glm_model: String,
    /// Reasoning token budget for `thinking`-enabled requests.
    pub glm_thinking_budget: u32,
    /// Whether to hit the coding-specific endpoint variant.
    pub zai_use_coding: bool,
    /// Perplexity model name for the search/research collaborator.
    pub perplexity_model: String,
    /// Per-request timeout (seconds) for the Brave search collaborator.
    pub brave_timeout_secs: u64,
    /// Cumulative hallucination-rate fail-fast threshold.
    pub hall_m_threshold: f64,
    /// Ceiling on skills produced in a single `generate` invocation.
    pub max_skills_per_run: u32,
    /// API keys, read once at startup and never logged.
    #[serde(skip_serializing)]
    pub zai_api_key: Option<String>,
    #[serde(skip_serializing)]
    pub perplexity_api_key: Option<String>,
    #[serde(skip_serializing)]
    pub brave_api_key: Option<String>,
    #[serde(skip_serializing)]
    pub voyage_api_key: Option<String>,
    #[serde(skip_serializing)]
    pub anthropic_api_key: Option<String>,
}

impl Default for SkillsFabricConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            zai_base_url: "https://api.z.ai/api/coding/paas/v4".to_string(),
            glm_model: "glm-4.7".to_string(),
            glm_thinking_budget: 8000,
            zai_use_coding: true,
            perplexity_model: "sonar".to_string(),
            brave_timeout_secs: 10,
            hall_m_threshold: 0.02,
            max_skills_per_run: 100,
            zai_api_key: None,
            perplexity_api_key: None,
            brave_api_key: None,
            voyage_api_key: None,
            anthropic_api_key: None,
        }
    }
}

fn default_data_dir() -> PathBuf {
    std::env::var("SKILLS_FABRIC_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs_home()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("skills_fabric")
                .join("data")
        })
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

impl SkillsFabricConfig {
    /// Build configuration from environment variables, applying the
    /// documented defaults for anything unset. API keys accept either the
    /// provider-native name or the `ZAI_API_KEY`/`GLM_API_KEY` alias.
    pub fn from_env() -> Self {
        let mut cfg = Self {
            zai_api_key: std::env::var("ZAI_API_KEY")
                .or_else(|_| std::env::var("GLM_API_KEY"))
                .ok(),
            perplexity_api_key: std::env::var("PERPLEXITY_API_KEY").ok(),
            brave_api_key: std::env::var("BRAVE_API_KEY").ok(),
            voyage_api_key: std::env::var("VOYAGE_API_KEY").ok(),
            anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
            ..Self::default()
        };

        if let Ok(model) = std::env::var("GLM_MODEL") {
            cfg.glm_model = model;
        }
        if let Ok(url) = std::env::var("ZAI_BASE_URL") {
            cfg.zai_base_url = url;
        }
        if let Ok(model) = std::env::var("PERPLEXITY_MODEL") {
            cfg.perplexity_model = model;
        }
        cfg.glm_thinking_budget = env_u64("GLM_THINKING_BUDGET", cfg.glm_thinking_budget as u64) as u32;
        cfg.zai_use_coding = env_bool("ZAI_USE_CODING", cfg.zai_use_coding);
        cfg.brave_timeout_secs = env_u64("BRAVE_TIMEOUT", cfg.brave_timeout_secs);
        cfg.hall_m_threshold = env_f64("HALL_M_THRESHOLD", cfg.hall_m_threshold);

        cfg
    }

    /// Ensure `data_dir` exists, mirroring the original config's
    /// directory-creation contract. Call once at startup.
    pub fn ensure_data_dir(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_dir).map_err(|e| ConfigError::DataDirUnwritable {
            path: self.data_dir.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Resolve a path relative to `data_dir` if it isn't already absolute.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }

    pub fn require_zai_key(&self) -> Result<&str, ConfigError> {
        self.zai_api_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("ZAI_API_KEY".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = SkillsFabricConfig::default();
        assert_eq!(cfg.glm_model, "glm-4.7");
        assert!((cfg.hall_m_threshold - 0.02).abs() < f64::EPSILON);
        assert_eq!(cfg.max_skills_per_run, 100);
    }

    #[test]
    fn resolve_joins_relative_paths() {
        let cfg = SkillsFabricConfig {
            data_dir: PathBuf::from("/tmp/skills_fabric"),
            ..Default::default()
        };
        assert_eq!(
            cfg.resolve("sessions.json"),
            PathBuf::from("/tmp/skills_fabric/sessions.json")
        );
        assert_eq!(
            cfg.resolve("/abs/path.json"),
            PathBuf::from("/abs/path.json")
        );
    }
}
