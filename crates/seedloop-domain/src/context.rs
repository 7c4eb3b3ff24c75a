//! Subagent context isolation and compression (spec §4.5, §4.10).
//!
//! A subagent never receives the parent's mutable state — only a
//! `FilteredContext` built fresh per call. `CompressedContext` is the output
//! of the Context Compressor once a budget is exceeded; both are pure value
//! types here, with the compression algorithm itself living in
//! `seedloop-engine` (it needs the LLM port, which this crate must not
//! depend on).

use serde::{Deserialize, Serialize};

use crate::ac_tree::AcNode;

/// The last N entries of execution history handed to a subagent or kept
/// after compression (spec: "recent_history (last 3)").
pub const RECENT_HISTORY_LEN: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub iteration: u32,
    pub summary: String,
}

/// What a subagent is given: never the parent's mutable state, only this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilteredContext {
    pub seed_summary: String,
    pub current_ac: AcNode,
    pub recent_history: Vec<HistoryEntry>,
    pub relevant_facts: Vec<String>,
}

impl FilteredContext {
    pub fn build(
        seed_summary: String,
        current_ac: AcNode,
        history: &[HistoryEntry],
        relevant_facts: Vec<String>,
    ) -> Self {
        let recent_history = history
            .iter()
            .rev()
            .take(RECENT_HISTORY_LEN)
            .rev()
            .cloned()
            .collect();
        Self {
            seed_summary,
            current_ac,
            recent_history,
            relevant_facts,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CompressorConfig {
    pub max_tokens: u64,
    pub max_age_hours: i64,
    pub compression_depth: u8,
}

impl Default for CompressorConfig {
    fn default() -> Self {
        Self {
            max_tokens: 100_000,
            max_age_hours: 6,
            compression_depth: 3,
        }
    }
}

/// Output of the Context Compressor. Always preserves, at minimum,
/// `seed_summary`, `current_ac`, `recent_history` (last 3), and `key_facts`
/// (spec §4.10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressedContext {
    pub seed_summary: String,
    pub current_ac: AcNode,
    pub recent_history: Vec<HistoryEntry>,
    pub key_facts: Vec<String>,
    pub tokens_before: u64,
    pub tokens_after: u64,
    pub fallback_used: bool,
}
