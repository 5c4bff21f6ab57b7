//! The zero-hallucination code-skill generation pipeline: mine source
//! symbols, prove links between concepts and symbols, draft candidate
//! skills, audit every claim they make against the source, verify the
//! code sample runs, and store only what survives. Every submodule here
//! corresponds to one pipeline stage or cross-cutting concern; `workflow`
//! is the supervisor that sequences them.

pub mod citation;
pub mod claims;
pub mod collaborators;
pub mod config;
pub mod ddr;
pub mod error;
pub mod failure_tracker;
pub mod hall_metric;
pub mod llm_client;
pub mod memory;
pub mod multi_agent_auditor;
pub mod promises;
pub mod ralph_wiggum;
pub mod source_ref;
pub mod validator;
pub mod workflow;

pub use citation::{CitationConfig, CitationFormat, CitationResult, CitationSystem};
pub use claims::{AuditResult, Claim, ClaimAuditor, ClaimExtractor, ClaimType, ClaimVerification, Severity};
pub use collaborators::{
    Concept, GraphStorageClient, InMemoryGraphStore, Language, PerplexitySearch, SandboxOracle, SearchProvider,
    SearchResult, SkillRecordRef, SyntaxCheckSandbox,
};
pub use config::SkillsFabricConfig;
pub use ddr::{Ddr, DdrResult};
pub use error::{
    AuditError, ConfigError, DdrError, ExternalServiceError, FailureType, HallMetricExceeded, IterationError,
    LlmClientError, ValidatorError,
};
pub use failure_tracker::{FailureRecord, FailureTracker, Strategy, StrategyAdjustment};
pub use hall_metric::{HallMetric, HallRecord, HallSummary};
pub use llm_client::{
    CostModel, LlmClient, LlmClientMetrics, LlmProvider, LlmRequest, LlmResponse, ReasoningQuality, RetryPolicy,
    ThinkingFailure, TokenUsage, ZaiProvider,
};
pub use memory::{AgentMemory, Bead, BeadStatus, BeadStore, InMemoryAgentMemory, MemoryEntry, MemoryEntryKind};
pub use multi_agent_auditor::{AgentAnalysis, CombinedVerdict, Issue, IssueSeverity, MultiAgentAuditor};
pub use promises::{standard_skill_promises, CompletionPromise, PromiseResult, PromiseSet, SkillGenerationOutcome};
pub use ralph_wiggum::{AbortHandle, IterationResult, LoopResult, LoopStatus, RalphWiggumLoop};
pub use source_ref::{CodeElement, SourceRef, SymbolCatalog, SymbolCatalogEntry, SymbolType};
pub use validator::{ValidationResult, ValidationSource, Validator};
pub use workflow::{
    AgentMessage, MatchStrategy, MessageBus, MinedSnippet, MinedSymbol, ProvenLink, SkillRecord, Supervisor,
    SupervisorConfig, WorkflowState,
};
