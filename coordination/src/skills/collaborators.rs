//! External collaborator interfaces: the sandbox oracle, the graph storage
//! client, and the search providers (Perplexity, Brave). These sit at the
//! pipeline's edge — their correctness is not part of the zero-hallucination
//! grounding guarantee, only their wire contract is.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use tree_sitter::Parser;

use super::config::SkillsFabricConfig;
use super::error::ExternalServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    Rust,
    Python,
    TypeScript,
    Go,
    Unknown,
}

/// Confirms whether a skill's code sample actually runs/parses.
pub trait SandboxOracle: Send + Sync {
    fn verify(&self, code: &str, language: Language) -> bool;
}

/// Syntax-only sandbox: parses with the matching tree-sitter grammar and
/// accepts code with no `ERROR` nodes. A placeholder for a real execution
/// sandbox, but enough to reject obviously broken snippets before storage.
pub struct SyntaxCheckSandbox;

impl SandboxOracle for SyntaxCheckSandbox {
    fn verify(&self, code: &str, language: Language) -> bool {
        let grammar: tree_sitter::Language = match language {
            Language::Rust => tree_sitter_rust::LANGUAGE.into(),
            Language::Python => tree_sitter_python::LANGUAGE.into(),
            Language::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Language::Go => tree_sitter_go::LANGUAGE.into(),
            Language::Unknown => return !code.trim().is_empty(),
        };
        let mut parser = Parser::new();
        if parser.set_language(&grammar).is_err() {
            return false;
        }
        match parser.parse(code, None) {
            Some(tree) => !tree.root_node().has_error(),
            None => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Concept {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillRecordRef {
    pub id: String,
    pub taught_concepts: Vec<String>,
    pub used_symbols: Vec<String>,
    pub test_result_id: Option<String>,
}

/// Persists the concept/symbol/skill/test-result graph. The core only ever
/// creates nodes and the four documented edges, all parameterized.
#[async_trait]
pub trait GraphStorageClient: Send + Sync {
    async fn load_concepts(&self) -> Result<Vec<Concept>, ExternalServiceError>;
    async fn create_proven_edge(
        &self,
        concept: &str,
        symbol: &str,
        confidence: f64,
        match_type: &str,
    ) -> Result<(), ExternalServiceError>;
    async fn store_skill(&self, skill: &SkillRecordRef) -> Result<(), ExternalServiceError>;
}

#[derive(Debug, Clone)]
enum GraphNode {
    Concept(String),
    Symbol(String),
    Skill(String),
    TestResult(String),
}

#[derive(Debug, Clone)]
enum GraphEdge {
    Proven { confidence: f64, match_type: String },
    Teaches,
    Uses,
    VerifiedBy,
}

/// In-memory `petgraph`-backed stand-in for the real graph database, used
/// by default and in tests. Writes are idempotent: a duplicate `PROVEN`
/// edge for the same (concept, symbol) pair is a silent no-op.
#[derive(Default)]
pub struct InMemoryGraphStore {
    graph: std::sync::Mutex<DiGraph<GraphNode, GraphEdge>>,
    index: std::sync::Mutex<HashMap<String, NodeIndex>>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn node_for(&self, key: String, make: impl FnOnce() -> GraphNode) -> NodeIndex {
        let mut index = self.index.lock().expect("graph index lock poisoned");
        if let Some(existing) = index.get(&key) {
            return *existing;
        }
        let mut graph = self.graph.lock().expect("graph lock poisoned");
        let idx = graph.add_node(make());
        index.insert(key, idx);
        idx
    }

    pub fn seed_concept(&self, name: &str) {
        self.node_for(format!("concept:{name}"), || GraphNode::Concept(name.to_string()));
    }

    pub fn concept_count(&self) -> usize {
        self.index
            .lock()
            .expect("graph index lock poisoned")
            .keys()
            .filter(|k| k.starts_with("concept:"))
            .count()
    }
}

#[async_trait]
impl GraphStorageClient for InMemoryGraphStore {
    async fn load_concepts(&self) -> Result<Vec<Concept>, ExternalServiceError> {
        let index = self.index.lock().expect("graph index lock poisoned");
        let graph = self.graph.lock().expect("graph lock poisoned");
        Ok(index
            .iter()
            .filter_map(|(key, idx)| {
                key.strip_prefix("concept:").and_then(|_| match &graph[*idx] {
                    GraphNode::Concept(name) => Some(Concept {
                        name: name.clone(),
                        description: None,
                    }),
                    _ => None,
                })
            })
            .collect())
    }

    async fn create_proven_edge(
        &self,
        concept: &str,
        symbol: &str,
        confidence: f64,
        match_type: &str,
    ) -> Result<(), ExternalServiceError> {
        let concept_idx = self.node_for(format!("concept:{concept}"), || GraphNode::Concept(concept.to_string()));
        let symbol_idx = self.node_for(format!("symbol:{symbol}"), || GraphNode::Symbol(symbol.to_string()));

        let mut graph = self.graph.lock().expect("graph lock poisoned");
        let already_proven = graph.edges(concept_idx).any(|e| e.target() == symbol_idx);
        if !already_proven {
            graph.add_edge(
                concept_idx,
                symbol_idx,
                GraphEdge::Proven {
                    confidence,
                    match_type: match_type.to_string(),
                },
            );
        }
        Ok(())
    }

    async fn store_skill(&self, skill: &SkillRecordRef) -> Result<(), ExternalServiceError> {
        let skill_idx = self.node_for(format!("skill:{}", skill.id), || GraphNode::Skill(skill.id.clone()));
        let mut graph = self.graph.lock().expect("graph lock poisoned");
        for concept in &skill.taught_concepts {
            let concept_idx = {
                drop(graph);
                let idx = self.node_for(format!("concept:{concept}"), || GraphNode::Concept(concept.clone()));
                graph = self.graph.lock().expect("graph lock poisoned");
                idx
            };
            graph.add_edge(skill_idx, concept_idx, GraphEdge::Teaches);
        }
        for symbol in &skill.used_symbols {
            let symbol_idx = {
                drop(graph);
                let idx = self.node_for(format!("symbol:{symbol}"), || GraphNode::Symbol(symbol.clone()));
                graph = self.graph.lock().expect("graph lock poisoned");
                idx
            };
            graph.add_edge(skill_idx, symbol_idx, GraphEdge::Uses);
        }
        if let Some(test_result) = &skill.test_result_id {
            let test_idx = {
                drop(graph);
                let idx = self.node_for(format!("test:{test_result}"), || {
                    GraphNode::TestResult(test_result.clone())
                });
                graph = self.graph.lock().expect("graph lock poisoned");
                idx
            };
            graph.add_edge(skill_idx, test_idx, GraphEdge::VerifiedBy);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, ExternalServiceError>;
}

pub struct PerplexitySearch {
    api_key: Option<String>,
    model: String,
    client: reqwest::Client,
}

impl PerplexitySearch {
    pub fn from_config(cfg: &SkillsFabricConfig) -> Self {
        Self {
            api_key: cfg.perplexity_api_key.clone(),
            model: cfg.perplexity_model.clone(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .expect("failed to build Perplexity HTTP client"),
        }
    }
}

#[async_trait]
impl SearchProvider for PerplexitySearch {
    fn name(&self) -> &'static str {
        "perplexity"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, ExternalServiceError> {
        let api_key = self.api_key.as_ref().ok_or_else(|| ExternalServiceError::Transport {
            service: "perplexity".to_string(),
            detail: "missing PERPLEXITY_API_KEY".to_string(),
        })?;

        let body = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": query}],
            "return_citations": true,
        });

        let response = self
            .client
            .post("https://api.perplexity.ai/chat/completions")
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ExternalServiceError::Transport {
                service: "perplexity".to_string(),
                detail: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(ExternalServiceError::HttpStatus {
                service: "perplexity".to_string(),
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let json: serde_json::Value = response.json().await.map_err(|e| ExternalServiceError::Transport {
            service: "perplexity".to_string(),
            detail: e.to_string(),
        })?;

        let citations = json["citations"].as_array().cloned().unwrap_or_default();
        Ok(citations
            .iter()
            .map(|c| match c {
                serde_json::Value::String(url) => SearchResult {
                    title: url.clone(),
                    url: url.clone(),
                    snippet: String::new(),
                },
                _ => SearchResult {
                    title: c["title"].as_str().unwrap_or_default().to_string(),
                    url: c["url"].as_str().unwrap_or_default().to_string(),
                    snippet: c["snippet"].as_str().unwrap_or_default().to_string(),
                },
            })
            .collect())
    }
}

pub struct BraveSearch {
    api_key: Option<String>,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl BraveSearch {
    pub fn from_config(cfg: &SkillsFabricConfig) -> Self {
        Self {
            api_key: cfg.brave_api_key.clone(),
            timeout_secs: cfg.brave_timeout_secs,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl SearchProvider for BraveSearch {
    fn name(&self) -> &'static str {
        "brave"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, ExternalServiceError> {
        let api_key = self.api_key.as_ref().ok_or_else(|| ExternalServiceError::Transport {
            service: "brave".to_string(),
            detail: "missing BRAVE_API_KEY".to_string(),
        })?;

        let truncated: String = query.chars().take(400).collect();
        let response = self
            .client
            .get("https://api.search.brave.com/res/v1/web/search")
            .header("X-Subscription-Token", api_key)
            .query(&[("q", truncated.as_str()), ("count", "10")])
            .timeout(Duration::from_secs(self.timeout_secs))
            .send()
            .await
            .map_err(|e| ExternalServiceError::Transport {
                service: "brave".to_string(),
                detail: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(ExternalServiceError::HttpStatus {
                service: "brave".to_string(),
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let json: serde_json::Value = response.json().await.map_err(|e| ExternalServiceError::Transport {
            service: "brave".to_string(),
            detail: e.to_string(),
        })?;

        let results = json["web"]["results"].as_array().cloned().unwrap_or_default();
        Ok(results
            .iter()
            .map(|r| SearchResult {
                title: r["title"].as_str().unwrap_or_default().to_string(),
                url: r["url"].as_str().unwrap_or_default().to_string(),
                snippet: r["description"].as_str().unwrap_or_default().to_string(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax_sandbox_accepts_valid_rust() {
        let sandbox = SyntaxCheckSandbox;
        assert!(sandbox.verify("fn main() {}", Language::Rust));
    }

    #[test]
    fn syntax_sandbox_rejects_malformed_rust() {
        let sandbox = SyntaxCheckSandbox;
        assert!(!sandbox.verify("fn main( {", Language::Rust));
    }

    #[tokio::test]
    async fn graph_store_proven_edge_is_idempotent() {
        let store = InMemoryGraphStore::new();
        store.create_proven_edge("StateGraph", "state.py:StateGraph", 0.9, "exact").await.unwrap();
        store.create_proven_edge("StateGraph", "state.py:StateGraph", 0.9, "exact").await.unwrap();
        let graph = store.graph.lock().unwrap();
        assert_eq!(graph.edge_count(), 1);
    }

    #[tokio::test]
    async fn graph_store_records_skill_edges() {
        let store = InMemoryGraphStore::new();
        store
            .store_skill(&SkillRecordRef {
                id: "skill-1".to_string(),
                taught_concepts: vec!["graphs".to_string()],
                used_symbols: vec!["StateGraph".to_string()],
                test_result_id: Some("test-1".to_string()),
            })
            .await
            .unwrap();
        let graph = store.graph.lock().unwrap();
        assert_eq!(graph.edge_count(), 3);
    }

    #[tokio::test]
    async fn load_concepts_reflects_seeded_concepts() {
        let store = InMemoryGraphStore::new();
        store.seed_concept("retrieval");
        let concepts = store.load_concepts().await.unwrap();
        assert_eq!(concepts.len(), 1);
        assert_eq!(concepts[0].name, "retrieval");
    }
}
