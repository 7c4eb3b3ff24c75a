//! Generation: one `evolve_step` invocation and its terminal or continuing
//! action, plus the action enum of the evolutionary loop (spec §3, §4.9).

use serde::{Deserialize, Serialize};

use crate::ids::{ContentHash, LineageId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvolutionAction {
    Continue,
    Converged,
    Stagnated,
    Exhausted,
    Failed,
    /// An AC node hit the decomposition hard limit (max depth, or a cycle
    /// where a child's text equals its parent's) and could not be split or
    /// completed. Distinct from a bare `Failed` because the external driver
    /// maps it to its own exit code.
    DecompositionFailed,
}

impl EvolutionAction {
    /// Canonical exit-code mapping for the external driver script (spec §6).
    /// `Continue` has no exit code of its own: the loop is still running.
    pub fn exit_code(self) -> Option<i32> {
        match self {
            EvolutionAction::Continue => None,
            EvolutionAction::Converged => Some(0),
            EvolutionAction::Stagnated => Some(10),
            EvolutionAction::Exhausted => Some(11),
            EvolutionAction::Failed => Some(12),
            EvolutionAction::DecompositionFailed => Some(14),
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, EvolutionAction::Continue)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generation {
    pub lineage_id: LineageId,
    pub generation_number: u32,
    pub seed_hash: ContentHash,
    pub ontology_version: u32,
    pub similarity_to_previous: f64,
    pub drift_score: f64,
    pub action: EvolutionAction,
}
