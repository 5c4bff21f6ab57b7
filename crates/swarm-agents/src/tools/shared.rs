//! Shared tool factory for concurrent agent sessions.
//!
//! Wraps tool construction so multiple agents can share the same tool
//! factory without rebuilding configuration per-agent. Each agent still
//! gets its own `Vec<Box<dyn ToolDyn>>` (tools are rebuilt from the factory),
//! but construction parameters are centralized and the factory is `Clone`-able.
//!
//! # Thread Safety
//!
//! `ToolFactory` is `Clone + Send + Sync`, so it can be shared across
//! concurrent agent sessions (e.g., behind an `Arc` or just cloned).
//!
//! # Example
//!
//! ```ignore
//! let wt_path = Path::new("/tmp/worktree");
//! let factory = ToolFactory::new(wt_path, false, vec![], None);
//!
//! // Each agent gets its own tool set from the same factory
//! let coder_tools = factory.worker_tools(WorkerRole::RustSpecialist);
//! let planner_tools = factory.worker_tools(WorkerRole::Planner);
//! let mgr_tools = factory.manager_tools();
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rig::tool::ToolDyn;

use super::bundles::{self, WorkerRole};
use crate::notebook_bridge::KnowledgeBase;

/// Factory for creating tool sets scoped to a worktree path.
///
/// Clone-able: each clone produces tools for the same worktree.
/// Thread-safe: can be shared across concurrent agent sessions.
///
/// This centralizes tool construction parameters (worktree path, proxy mode,
/// verifier packages, knowledge base) so callers don't need to thread them
/// through every agent builder call.
#[derive(Clone)]
pub struct ToolFactory {
    wt_path: PathBuf,
    proxy: bool,
    verifier_packages: Vec<String>,
    kb: Option<Arc<dyn KnowledgeBase>>,
}

impl ToolFactory {
    /// Create a new tool factory scoped to a worktree.
    ///
    /// # Arguments
    ///
    /// * `wt_path` - Root directory of the agent's worktree (sandbox boundary).
    /// * `proxy` - If true, tools get `proxy_` prefix for CLIAPIProxy compatibility.
    /// * `verifier_packages` - Cargo packages to scope the verifier to (empty = whole workspace).
    /// * `kb` - Optional knowledge base for the notebook query tool.
    pub fn new(
        wt_path: &Path,
        proxy: bool,
        verifier_packages: Vec<String>,
        kb: Option<Arc<dyn KnowledgeBase>>,
    ) -> Self {
        Self {
            wt_path: wt_path.to_path_buf(),
            proxy,
            verifier_packages,
            kb,
        }
    }

    /// The worktree path this factory is scoped to.
    pub fn wt_path(&self) -> &Path {
        &self.wt_path
    }

    /// Whether tools are proxy-prefixed.
    pub fn is_proxy(&self) -> bool {
        self.proxy
    }

    /// Build the tool bundle for a worker agent of the given role.
    ///
    /// Delegates to [`bundles::worker_tools`] with the factory's stored parameters.
    pub fn worker_tools(&self, role: WorkerRole) -> Vec<Box<dyn ToolDyn>> {
        bundles::worker_tools(&self.wt_path, role, self.proxy)
    }

    /// Build the deterministic tool bundle for a manager agent.
    ///
    /// Includes verifier, read_file, list_files.
    /// Delegates to [`bundles::manager_tools`] with the factory's stored parameters.
    pub fn manager_tools(&self) -> Vec<Box<dyn ToolDyn>> {
        bundles::manager_tools(&self.wt_path, &self.verifier_packages, self.proxy)
    }

    /// Build the optional knowledge base (notebook) tool bundle.
    ///
    /// Returns an empty vec if no knowledge base was configured.
    /// Delegates to [`bundles::notebook_tool`] with the factory's stored parameters.
    pub fn notebook_tools(&self) -> Vec<Box<dyn ToolDyn>> {
        bundles::notebook_tool(self.kb.clone(), self.proxy)
    }
}
