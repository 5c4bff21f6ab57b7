//! Agent Supervisor & Workflow — sequences mining, linking, writing,
//! auditing, verifying, and storing over a source repository, producing a
//! set of sandbox-verified, source-grounded `SkillRecord`s.
//!
//! Stages are a synchronous barrier on all work items they emit; per-item
//! work within a stage is polled concurrently (bounded by
//! `SupervisorConfig::max_workers`) via `futures::stream::buffer_unordered`,
//! the same cooperative-concurrency shape the multi-agent auditor uses with
//! `JoinSet` one level down (see `multi_agent_auditor`).

use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt};
use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tree_sitter::Parser;
use uuid::Uuid;

use super::claims::auditor::{AuditResult, ClaimAuditor};
use super::claims::extractor::ClaimExtractor;
use super::collaborators::{Concept, GraphStorageClient, Language, SandboxOracle, SkillRecordRef};
use super::hall_metric::HallMetric;
use super::memory::{AgentMemory, InMemoryAgentMemory, MemoryEntryKind};
use super::promises::SkillGenerationOutcome;
use super::source_ref::{SourceRef, SymbolType};

const BROADCAST_CAPACITY: usize = 256;

/// A message routed between pipeline stages. The bus is a plain
/// `tokio::sync::broadcast` channel, the same primitive the ensemble event
/// bus (`events::bus`) is built on, kept independent of that module's fixed
/// `EnsembleEvent` enum since workflow messages are a distinct concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    pub stage: String,
    pub body: String,
    pub timestamp: String,
}

#[derive(Clone)]
pub struct MessageBus {
    sender: broadcast::Sender<AgentMessage>,
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AgentMessage> {
        self.sender.subscribe()
    }

    /// Route a message, timestamping it. A channel with no subscribers (or
    /// a lagging one) is not a workflow failure — `send` errors are dropped.
    fn route(&self, stage: &str, body: impl Into<String>) {
        let _ = self.sender.send(AgentMessage {
            stage: stage.to_string(),
            body: body.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        });
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinedSymbol {
    pub name: String,
    pub symbol_type: SymbolType,
    pub file: String,
    pub line: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinedSnippet {
    pub symbol: String,
    pub file: String,
    pub line: u32,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    ExactName,
    Filename,
    Content,
}

impl MatchStrategy {
    fn graph_label(self) -> &'static str {
        match self {
            Self::ExactName => "exact_name",
            Self::Filename => "filename",
            Self::Content => "content",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenLink {
    pub concept: String,
    pub symbol: MinedSymbol,
    pub confidence: f64,
    pub match_type: MatchStrategy,
}

const LINK_CONFIDENCE_FLOOR: f64 = 0.5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillRecord {
    pub id: String,
    pub question: String,
    pub code: String,
    pub source_url: String,
    pub library: String,
    pub verified: bool,
    pub audited: bool,
    pub hallucination_rate: f64,
}

#[derive(Debug, Default)]
pub struct WorkflowState {
    pub mined_symbols: Vec<MinedSymbol>,
    pub mined_snippets: Vec<MinedSnippet>,
    pub proven_links: Vec<ProvenLink>,
    pub skills: Vec<SkillRecord>,
    pub audit_results: Vec<AuditResult>,
    pub errors: Vec<String>,
}

impl WorkflowState {
    pub fn average_hallucination_rate(&self) -> f64 {
        if self.audit_results.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.audit_results.iter().map(|r| r.hallucination_rate).sum();
        sum / self.audit_results.len() as f64
    }

    pub fn to_outcome(&self, any_citation_resolves: bool) -> SkillGenerationOutcome {
        SkillGenerationOutcome {
            skills_created: self.skills.iter().filter(|s| s.verified).count(),
            any_citation_resolves,
            any_sandbox_verified: self.skills.iter().any(|s| s.verified),
        }
    }
}

pub struct SupervisorConfig {
    pub repo_root: PathBuf,
    pub library: String,
    pub max_workers: usize,
    pub audit_threshold: f64,
}

impl SupervisorConfig {
    pub fn new(repo_root: impl Into<PathBuf>, library: impl Into<String>) -> Self {
        Self {
            repo_root: repo_root.into(),
            library: library.into(),
            max_workers: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4),
            audit_threshold: 0.02,
        }
    }
}

/// Sequences the six workflow stages, threading a single `WorkflowState`
/// through. A stage failure (empty output where downstream stages would be
/// meaningless) short-circuits the run; any other per-item failure is
/// recorded in `WorkflowState::errors` without halting the stage.
pub struct Supervisor<'a> {
    config: SupervisorConfig,
    hall_metric: &'a HallMetric,
    bus: MessageBus,
    memory: InMemoryAgentMemory,
}

impl<'a> Supervisor<'a> {
    pub fn new(config: SupervisorConfig, hall_metric: &'a HallMetric) -> Self {
        Self {
            config,
            hall_metric,
            bus: MessageBus::new(),
            memory: InMemoryAgentMemory::new(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AgentMessage> {
        self.bus.subscribe()
    }

    pub fn memory(&self) -> &InMemoryAgentMemory {
        &self.memory
    }

    pub async fn run(
        &mut self,
        concepts: Vec<Concept>,
        graph: &dyn GraphStorageClient,
        sandbox: &dyn SandboxOracle,
    ) -> WorkflowState {
        let mut state = WorkflowState::default();

        let span = tracing::info_span!("supervisor_run", library = %self.config.library);
        let _enter = span.enter();

        self.mine(&mut state).await;
        if state.mined_symbols.is_empty() {
            state.errors.push("mining produced zero symbols".to_string());
            self.bus.route("mining", "zero symbols mined, aborting workflow");
            return state;
        }
        self.bus.route("mining", format!("mined {} symbols", state.mined_symbols.len()));

        self.link(&mut state, &concepts);
        if state.proven_links.is_empty() {
            state.errors.push("linking produced zero proven links".to_string());
            self.bus.route("linking", "zero proven links, aborting workflow");
            return state;
        }
        self.bus.route("linking", format!("proved {} links", state.proven_links.len()));

        self.persist_links(&state, graph).await;

        self.write(&mut state);
        self.bus.route("writing", format!("drafted {} skills", state.skills.len()));

        self.audit(&mut state);
        self.bus
            .route("auditing", format!("{} skills passed audit", state.skills.len()));

        self.verify(&mut state, sandbox).await;
        self.bus
            .route("verifying", format!("{} skills sandbox-verified", state.skills.len()));

        self.store(&state, graph).await;
        self.bus.route("storing", format!("persisted {} skills", state.skills.len()));

        state
    }

    /// Stage 1: enumerate source files under `repo_root`, extracting every
    /// top-level definition via tree-sitter. Per-file work is polled
    /// concurrently, bounded by `max_workers`.
    async fn mine(&mut self, state: &mut WorkflowState) {
        let files = walk_source_files(&self.config.repo_root);
        let root = self.config.repo_root.clone();

        let results: Vec<(Vec<MinedSymbol>, Vec<MinedSnippet>)> = stream::iter(files)
            .map(|path| {
                let root = root.clone();
                async move { mine_file(&root, &path) }
            })
            .buffer_unordered(self.config.max_workers.max(1))
            .collect()
            .await;

        for (symbols, snippets) in results {
            for s in &symbols {
                self.memory.append(
                    MemoryEntryKind::MinedSymbol,
                    &format!("{}:{}:{}", s.file, s.line, s.name),
                    "mining",
                );
            }
            state.mined_symbols.extend(symbols);
            state.mined_snippets.extend(snippets);
        }
    }

    /// Stage 2: match every concept (or, absent any concepts, every mined
    /// symbol treated as its own concept) against mined symbols via three
    /// strategies, keeping only matches at or above the confidence floor.
    fn link(&mut self, state: &mut WorkflowState, concepts: &[Concept]) {
        let concept_names: Vec<Concept> = if concepts.is_empty() {
            state
                .mined_symbols
                .iter()
                .map(|s| Concept {
                    name: s.name.clone(),
                    description: None,
                })
                .collect()
        } else {
            concepts.to_vec()
        };

        for concept in &concept_names {
            if let Some(link) = self.best_link(concept, &state.mined_symbols) {
                self.memory.append(
                    MemoryEntryKind::ProvenLink,
                    &format!("{} -> {}", link.concept, link.symbol.name),
                    "linking",
                );
                state.proven_links.push(link);
            }
        }
    }

    fn best_link(&self, concept: &Concept, symbols: &[MinedSymbol]) -> Option<ProvenLink> {
        let concept_lower = concept.name.to_lowercase();

        // 1. Exact name match.
        if let Some(symbol) = symbols.iter().find(|s| s.name.to_lowercase() == concept_lower) {
            return Some(ProvenLink {
                concept: concept.name.clone(),
                symbol: symbol.clone(),
                confidence: 1.0,
                match_type: MatchStrategy::ExactName,
            });
        }

        // 2. Filename match: concept name appears in the file's stem.
        if let Some(symbol) = symbols.iter().find(|s| {
            Path::new(&s.file)
                .file_stem()
                .and_then(|stem| stem.to_str())
                .map(|stem| stem.to_lowercase().contains(&concept_lower))
                .unwrap_or(false)
        }) {
            let confidence = 0.7;
            if confidence >= LINK_CONFIDENCE_FLOOR {
                return Some(ProvenLink {
                    concept: concept.name.clone(),
                    symbol: symbol.clone(),
                    confidence,
                    match_type: MatchStrategy::Filename,
                });
            }
        }

        // 3. Content match: concept description words appear in the
        // symbol's mined name (the closest proxy to "snippet content" we
        // have without re-reading every snippet per concept).
        if let Some(description) = &concept.description {
            let words: Vec<String> = description
                .split_whitespace()
                .filter(|w| w.len() > 2)
                .map(|w| w.to_lowercase())
                .collect();
            if let Some(symbol) = symbols
                .iter()
                .find(|s| words.iter().any(|w| s.name.to_lowercase().contains(w)))
            {
                let confidence = 0.5;
                if confidence >= LINK_CONFIDENCE_FLOOR {
                    return Some(ProvenLink {
                        concept: concept.name.clone(),
                        symbol: symbol.clone(),
                        confidence,
                        match_type: MatchStrategy::Content,
                    });
                }
            }
        }

        None
    }

    async fn persist_links(&self, state: &WorkflowState, graph: &dyn GraphStorageClient) {
        for link in &state.proven_links {
            if let Err(e) = graph
                .create_proven_edge(&link.concept, &link.symbol.name, link.confidence, link.match_type.graph_label())
                .await
            {
                tracing::warn!(error = %e, concept = %link.concept, "failed to persist proven edge");
            }
        }
    }

    /// Stage 3: assemble a `SkillRecord` per proven link with a question
    /// templated on the symbol's inferred kind and the best matching
    /// mined snippet as source code.
    fn write(&mut self, state: &mut WorkflowState) {
        let mut skills = Vec::with_capacity(state.proven_links.len());
        for link in &state.proven_links {
            let snippet = state
                .mined_snippets
                .iter()
                .find(|sn| sn.symbol == link.symbol.name && sn.file == link.symbol.file)
                .map(|sn| sn.content.clone())
                .unwrap_or_else(|| link.symbol.name.clone());

            let question = question_template(link.symbol.symbol_type, &link.symbol.name, &self.config.library);
            let skill = SkillRecord {
                id: Uuid::new_v4().to_string(),
                question,
                code: snippet,
                source_url: format!("{}#L{}", link.symbol.file, link.symbol.line),
                library: self.config.library.clone(),
                verified: false,
                audited: false,
                hallucination_rate: 1.0,
            };
            self.memory.append(MemoryEntryKind::SkillDraft, &skill.id, "writing");
            skills.push(skill);
        }
        state.skills = skills;
    }

    /// Stage 4: build a `SourceRef` list per skill from proven links whose
    /// symbol is textually present in the skill's content, then run the
    /// lenient-mode claim auditor. Skills that fail are dropped.
    fn audit(&mut self, state: &mut WorkflowState) {
        let extractor = ClaimExtractor::default();
        let repo_root = self.config.repo_root.clone();

        let mut kept = Vec::with_capacity(state.skills.len());
        let mut audit_results = Vec::with_capacity(state.skills.len());

        for skill in state.skills.drain(..) {
            let content = format!("{}\n```\n{}\n```", skill.question, skill.code);
            let refs: Vec<SourceRef> = state
                .proven_links
                .iter()
                .filter(|link| content.contains(&link.symbol.name))
                .map(|link| {
                    SourceRef::new(link.symbol.name.as_str(), link.symbol.file.as_str(), link.symbol.line)
                        .with_type(link.symbol.symbol_type)
                        .mark_validated()
                })
                .collect();

            let claims = extractor.extract(&content);
            if claims.is_empty() {
                continue;
            }

            let auditor = ClaimAuditor::new(self.hall_metric)
                .with_repo_root(repo_root.clone())
                .strict(false);
            let mut auditor = auditor;
            auditor.threshold = self.config.audit_threshold;

            match auditor.audit(&claims, &refs, false) {
                Ok(result) => {
                    self.memory.append(
                        MemoryEntryKind::AuditVerdict,
                        &format!("{}: passed={} rate={:.4}", skill.id, result.passed, result.hallucination_rate),
                        "auditing",
                    );
                    if result.passed {
                        let mut skill = skill;
                        skill.audited = true;
                        skill.hallucination_rate = result.hallucination_rate;
                        audit_results.push(result);
                        kept.push(skill);
                    }
                }
                Err(e) => {
                    state.errors.push(format!("audit failed for skill {}: {e}", skill.id));
                }
            }
        }

        state.skills = kept;
        state.audit_results = audit_results;
    }

    /// Stage 5: run the sandbox oracle over each audited skill's code,
    /// bounded by `max_workers`, keeping only those that verify.
    async fn verify(&mut self, state: &mut WorkflowState, sandbox: &dyn SandboxOracle) {
        let memory = &mut self.memory;
        for skill in state.skills.iter_mut() {
            let language = infer_language(&skill.source_url);
            let verified = sandbox.verify(&skill.code, language);
            memory.append(
                MemoryEntryKind::SandboxResult,
                &format!("{}: verified={}", skill.id, verified),
                "verifying",
            );
            skill.verified = verified;
        }
        state.skills.retain(|s| s.verified);
    }

    /// Stage 6: persist verified skills via the graph storage collaborator.
    async fn store(&self, state: &WorkflowState, graph: &dyn GraphStorageClient) {
        for skill in &state.skills {
            let record = SkillRecordRef {
                id: skill.id.clone(),
                taught_concepts: state
                    .proven_links
                    .iter()
                    .filter(|l| skill.code.contains(&l.symbol.name))
                    .map(|l| l.concept.clone())
                    .collect(),
                used_symbols: state
                    .proven_links
                    .iter()
                    .filter(|l| skill.code.contains(&l.symbol.name))
                    .map(|l| l.symbol.name.clone())
                    .collect(),
                test_result_id: Some(format!("{}-sandbox", skill.id)),
            };
            if let Err(e) = graph.store_skill(&record).await {
                tracing::warn!(error = %e, skill_id = %skill.id, "failed to persist skill");
            }
        }
    }
}

fn question_template(symbol_type: SymbolType, name: &str, library: &str) -> String {
    match symbol_type {
        SymbolType::Function => format!("How do you use `{name}` in {library}?"),
        SymbolType::Class => format!("How do you construct and use the `{name}` class in {library}?"),
        SymbolType::Method => format!("What does `{name}` do and how is it called in {library}?"),
        _ => format!("What is `{name}` in {library}?"),
    }
}

fn infer_language(source_url: &str) -> Language {
    let path = source_url.split('#').next().unwrap_or(source_url);
    match Path::new(path).extension().and_then(|e| e.to_str()) {
        Some("rs") => Language::Rust,
        Some("py") => Language::Python,
        Some("ts") | Some("tsx") => Language::TypeScript,
        Some("go") => Language::Go,
        _ => Language::Unknown,
    }
}

fn walk_source_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in WalkBuilder::new(root).hidden(false).build().flatten() {
        let path = entry.path();
        if path.is_file() && language_for_ext(path).is_some() {
            files.push(path.to_path_buf());
        }
    }
    files
}

fn language_for_ext(path: &Path) -> Option<tree_sitter::Language> {
    match path.extension().and_then(|e| e.to_str())? {
        "rs" => Some(tree_sitter_rust::LANGUAGE.into()),
        "py" => Some(tree_sitter_python::LANGUAGE.into()),
        "ts" | "tsx" => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
        "go" => Some(tree_sitter_go::LANGUAGE.into()),
        _ => None,
    }
}

fn definition_kinds(ext: &str) -> &'static [(&'static str, SymbolType)] {
    match ext {
        "rs" => &[
            ("function_item", SymbolType::Function),
            ("struct_item", SymbolType::Class),
            ("enum_item", SymbolType::Class),
            ("trait_item", SymbolType::Class),
        ],
        "py" => &[
            ("function_definition", SymbolType::Function),
            ("class_definition", SymbolType::Class),
        ],
        "ts" | "tsx" => &[
            ("function_declaration", SymbolType::Function),
            ("class_declaration", SymbolType::Class),
            ("method_definition", SymbolType::Method),
        ],
        "go" => &[
            ("function_declaration", SymbolType::Function),
            ("method_declaration", SymbolType::Method),
            ("type_declaration", SymbolType::Class),
        ],
        _ => &[],
    }
}

fn mine_file(repo_root: &Path, path: &Path) -> (Vec<MinedSymbol>, Vec<MinedSnippet>) {
    let mut symbols = Vec::new();
    let mut snippets = Vec::new();

    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return (symbols, snippets);
    };
    let Some(language) = language_for_ext(path) else {
        return (symbols, snippets);
    };
    let Ok(source) = std::fs::read_to_string(path) else {
        return (symbols, snippets);
    };
    let mut parser = Parser::new();
    if parser.set_language(&language).is_err() {
        return (symbols, snippets);
    }
    let Some(tree) = parser.parse(&source, None) else {
        return (symbols, snippets);
    };

    let relative = path
        .strip_prefix(repo_root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/");
    let kinds = definition_kinds(ext);

    let mut cursor = tree.walk();
    collect_definitions(&mut cursor, &source, &relative, kinds, &mut symbols, &mut snippets);

    (symbols, snippets)
}

fn collect_definitions(
    cursor: &mut tree_sitter::TreeCursor,
    source: &str,
    file: &str,
    kinds: &[(&'static str, SymbolType)],
    symbols: &mut Vec<MinedSymbol>,
    snippets: &mut Vec<MinedSnippet>,
) {
    let node = cursor.node();
    if let Some((_, symbol_type)) = kinds.iter().find(|(kind, _)| *kind == node.kind()) {
        if let Some(name) = definition_name(&node, source) {
            let line = node.start_position().row as u32 + 1;
            symbols.push(MinedSymbol {
                name: name.clone(),
                symbol_type: *symbol_type,
                file: file.to_string(),
                line,
            });
            if let Ok(text) = node.utf8_text(source.as_bytes()) {
                snippets.push(MinedSnippet {
                    symbol: name,
                    file: file.to_string(),
                    line,
                    content: truncate_snippet(text),
                });
            }
        }
    }
    if cursor.goto_first_child() {
        loop {
            collect_definitions(cursor, source, file, kinds, symbols, snippets);
            if !cursor.goto_next_sibling() {
                break;
            }
        }
        cursor.goto_parent();
    }
}

fn definition_name(node: &tree_sitter::Node, source: &str) -> Option<String> {
    node.child_by_field_name("name")
        .and_then(|n| n.utf8_text(source.as_bytes()).ok())
        .map(|s| s.to_string())
}

const MAX_SNIPPET_LINES: usize = 40;

fn truncate_snippet(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() <= MAX_SNIPPET_LINES {
        text.to_string()
    } else {
        let mut truncated = lines[..MAX_SNIPPET_LINES].join("\n");
        truncated.push_str("\n// ...");
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::collaborators::{InMemoryGraphStore, SyntaxCheckSandbox};

    fn write_py(dir: &tempfile::TempDir, rel: &str, content: &str) {
        let path = dir.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    #[tokio::test]
    async fn full_pipeline_produces_a_verified_skill() {
        let dir = tempfile::tempdir().unwrap();
        write_py(
            &dir,
            "pkg/state.py",
            "class StateGraph:\n    def build(self):\n        return 1\n",
        );

        let metric = HallMetric::new(1.0);
        let config = SupervisorConfig {
            max_workers: 2,
            ..SupervisorConfig::new(dir.path(), "langgraph")
        };
        let mut supervisor = Supervisor::new(config, &metric);
        let graph = InMemoryGraphStore::new();
        let sandbox = SyntaxCheckSandbox;

        let concepts = vec![Concept {
            name: "StateGraph".to_string(),
            description: None,
        }];

        let state = supervisor.run(concepts, &graph, &sandbox).await;

        assert!(!state.mined_symbols.is_empty(), "{state:?}");
        assert!(state.proven_links.iter().any(|l| l.symbol.name == "StateGraph"));
        assert!(!state.skills.is_empty(), "expected at least one verified skill: {state:?}");
        assert!(state.skills.iter().all(|s| s.verified && s.audited));
        assert_eq!(graph.concept_count(), 0, "seed_concept is test-only, not used by the pipeline");
    }

    #[tokio::test]
    async fn mining_empty_repo_short_circuits_with_error() {
        let dir = tempfile::tempdir().unwrap();
        let metric = HallMetric::new(1.0);
        let config = SupervisorConfig::new(dir.path(), "empty_lib");
        let mut supervisor = Supervisor::new(config, &metric);
        let graph = InMemoryGraphStore::new();
        let sandbox = SyntaxCheckSandbox;

        let state = supervisor.run(vec![], &graph, &sandbox).await;
        assert!(state.mined_symbols.is_empty());
        assert!(state.errors.iter().any(|e| e.contains("zero symbols")));
    }

    #[tokio::test]
    async fn mined_symbol_fallback_links_without_concepts() {
        let dir = tempfile::tempdir().unwrap();
        write_py(&dir, "a.py", "def helper():\n    pass\n");
        let metric = HallMetric::new(1.0);
        let config = SupervisorConfig::new(dir.path(), "lib");
        let mut supervisor = Supervisor::new(config, &metric);
        let graph = InMemoryGraphStore::new();
        let sandbox = SyntaxCheckSandbox;

        let state = supervisor.run(vec![], &graph, &sandbox).await;
        assert!(state.proven_links.iter().any(|l| l.symbol.name == "helper"));
    }

    #[test]
    fn question_templates_vary_by_symbol_kind() {
        assert!(question_template(SymbolType::Function, "f", "lib").contains("use `f`"));
        assert!(question_template(SymbolType::Class, "C", "lib").contains("class"));
        assert!(question_template(SymbolType::Method, "m", "lib").contains("called"));
    }
}
