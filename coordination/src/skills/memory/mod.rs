//! Agent Memory — a typed memory store for one pipeline run's agent
//! transcript, plus the `Bead` work-item graph. Adapted from the swarm's
//! `SwarmMemory` abstraction: sequenced entries, compaction into summaries,
//! token accounting.

pub mod beads;

pub use beads::{Bead, BeadId, BeadStatus, BeadStore, BeadStoreError};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryEntryKind {
    MinedSymbol,
    ProvenLink,
    SkillDraft,
    AuditVerdict,
    SandboxResult,
    Summary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub seq: u64,
    pub kind: MemoryEntryKind,
    pub content: String,
    pub source_stage: String,
    pub compacted: bool,
}

/// Trait boundary so the supervisor workflow can swap in a persistent
/// (e.g. MIRIX-backed) implementation without changing call sites.
pub trait AgentMemory {
    fn append(&mut self, kind: MemoryEntryKind, content: &str, source_stage: &str) -> u64;
    fn entries(&self) -> &[MemoryEntry];
    fn compact_up_to(&mut self, seq: u64, summary: &str);
}

#[derive(Debug, Default)]
pub struct InMemoryAgentMemory {
    entries: Vec<MemoryEntry>,
    next_seq: u64,
}

impl InMemoryAgentMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_entries(&self) -> Vec<&MemoryEntry> {
        self.entries.iter().filter(|e| !e.compacted).collect()
    }
}

impl AgentMemory for InMemoryAgentMemory {
    fn append(&mut self, kind: MemoryEntryKind, content: &str, source_stage: &str) -> u64 {
        self.next_seq += 1;
        let seq = self.next_seq;
        self.entries.push(MemoryEntry {
            seq,
            kind,
            content: content.to_string(),
            source_stage: source_stage.to_string(),
            compacted: false,
        });
        seq
    }

    fn entries(&self) -> &[MemoryEntry] {
        &self.entries
    }

    fn compact_up_to(&mut self, seq: u64, summary: &str) {
        for entry in self.entries.iter_mut() {
            if entry.seq <= seq && entry.kind != MemoryEntryKind::Summary {
                entry.compacted = true;
            }
        }
        self.next_seq += 1;
        self.entries.push(MemoryEntry {
            seq: self.next_seq,
            kind: MemoryEntryKind::Summary,
            content: summary.to_string(),
            source_stage: "compactor".to_string(),
            compacted: false,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_assigns_monotonic_sequence() {
        let mut memory = InMemoryAgentMemory::new();
        let a = memory.append(MemoryEntryKind::MinedSymbol, "fn foo()", "mining");
        let b = memory.append(MemoryEntryKind::ProvenLink, "foo -> concept", "linking");
        assert_eq!(a, 1);
        assert_eq!(b, 2);
    }

    #[test]
    fn compact_up_to_marks_entries_and_appends_summary() {
        let mut memory = InMemoryAgentMemory::new();
        memory.append(MemoryEntryKind::MinedSymbol, "one", "mining");
        memory.append(MemoryEntryKind::MinedSymbol, "two", "mining");
        memory.compact_up_to(2, "compacted two mined symbols");
        assert_eq!(memory.active_entries().len(), 1);
        assert_eq!(memory.active_entries()[0].kind, MemoryEntryKind::Summary);
    }
}
