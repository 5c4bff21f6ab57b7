//! Beads — a work-item graph with dependency edges. Mirrors the harness's
//! `FeatureRegistry` persistence strategy: JSON on disk, a `.backup` copy
//! kept alongside it, and automatic recovery to an empty registry if both
//! are corrupted rather than failing the run.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type BeadId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeadStatus {
    Ready,
    Blocked,
    InProgress,
    Done,
    Abandoned,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bead {
    pub id: BeadId,
    pub title: String,
    pub status: BeadStatus,
    #[serde(default)]
    pub priority: u8,
    #[serde(default, skip_serializing_if = "HashSet::is_empty")]
    pub dependencies: HashSet<BeadId>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub learnings: String,
}

impl Bead {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            status: BeadStatus::Ready,
            priority: 5,
            dependencies: HashSet::new(),
            learnings: String::new(),
        }
    }

    pub fn depends_on(mut self, dep: impl Into<String>) -> Self {
        self.dependencies.insert(dep.into());
        self.status = BeadStatus::Blocked;
        self
    }
}

#[derive(Debug, Error)]
pub enum BeadStoreError {
    #[error("failed to read {path}: {source}")]
    Read { path: String, source: std::io::Error },
    #[error("failed to write {path}: {source}")]
    Write { path: String, source: std::io::Error },
    #[error("failed to parse bead registry: {0}")]
    Invalid(String),
}

/// A registry of `Bead`s with dependency-driven readiness.
pub struct BeadStore {
    beads: Vec<Bead>,
    path: PathBuf,
}

impl BeadStore {
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            beads: Vec::new(),
            path: path.into(),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, BeadStoreError> {
        let path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&path).map_err(|source| BeadStoreError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let beads: Vec<Bead> =
            serde_json::from_str(&content).map_err(|e| BeadStoreError::Invalid(e.to_string()))?;
        Ok(Self { beads, path })
    }

    /// Load from `path`, falling back to `path.backup` if the primary is
    /// missing or corrupt, and to an empty store if both fail.
    pub fn load_with_recovery(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let backup_path = path.with_extension("json.backup");

        match Self::load(&path) {
            Ok(store) => return store,
            Err(BeadStoreError::Read { .. }) => {}
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "bead registry corrupted, trying backup");
            }
        }

        if backup_path.exists() {
            match Self::load(&backup_path) {
                Ok(mut store) => {
                    tracing::info!(backup = %backup_path.display(), "recovered bead registry from backup");
                    store.path = path;
                    let _ = store.save();
                    return store;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "bead registry backup also corrupted");
                }
            }
        }

        Self::empty(path)
    }

    /// Write atomically: back up the existing file, write to a temp path,
    /// then rename into place.
    pub fn save(&self) -> Result<(), BeadStoreError> {
        let backup_path = self.path.with_extension("json.backup");
        let temp_path = self.path.with_extension("json.tmp");

        if self.path.exists() {
            let _ = std::fs::copy(&self.path, &backup_path);
        }

        let content =
            serde_json::to_string_pretty(&self.beads).map_err(|e| BeadStoreError::Invalid(e.to_string()))?;
        std::fs::write(&temp_path, content).map_err(|source| BeadStoreError::Write {
            path: temp_path.display().to_string(),
            source,
        })?;
        std::fs::rename(&temp_path, &self.path).map_err(|source| BeadStoreError::Write {
            path: self.path.display().to_string(),
            source,
        })?;
        Ok(())
    }

    pub fn add(&mut self, bead: Bead) {
        self.beads.push(bead);
    }

    pub fn get(&self, id: &str) -> Option<&Bead> {
        self.beads.iter().find(|b| b.id == id)
    }

    pub fn beads(&self) -> &[Bead] {
        &self.beads
    }

    /// Beads with every dependency marked `Done`, and not already `Done`/`Abandoned`.
    pub fn ready_beads(&self) -> Vec<&Bead> {
        self.beads
            .iter()
            .filter(|b| !matches!(b.status, BeadStatus::Done | BeadStatus::Abandoned))
            .filter(|b| {
                b.dependencies
                    .iter()
                    .all(|dep| self.get(dep).map(|d| d.status == BeadStatus::Done).unwrap_or(false))
            })
            .collect()
    }

    /// Transition `id` to `new_status`, re-deriving `Ready` vs `Blocked`
    /// when the move is a re-queue (`InProgress -> Ready`) rather than a
    /// forward, monotonic completion.
    pub fn transition(&mut self, id: &str, new_status: BeadStatus) -> bool {
        let deps_done = self
            .get(id)
            .map(|b| {
                b.dependencies
                    .iter()
                    .all(|dep| self.get(dep).map(|d| d.status == BeadStatus::Done).unwrap_or(false))
            })
            .unwrap_or(false);

        if let Some(bead) = self.beads.iter_mut().find(|b| b.id == id) {
            bead.status = match new_status {
                BeadStatus::Ready if !deps_done => BeadStatus::Blocked,
                other => other,
            };
            true
        } else {
            false
        }
    }
}
