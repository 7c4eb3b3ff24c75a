//! State machines per spec §4.5 (Double-Diamond executor phases).
//!
//! Kept as a pure `match` over `(current, transition)` tuples, the same
//! shape the rest of this workspace uses for its state machines: no
//! implicit default edges, every legal transition spelled out.

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// The four Double-Diamond phases, executed in order for each AC node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiamondPhase {
    Discover,
    Define,
    Design,
    Deliver,
    Done,
}

#[derive(Debug, Clone, Copy)]
pub enum DiamondTransition {
    /// Discover (diverge) completed, move to Define (converge).
    Converge,
    /// Define decided the node is non-atomic: children re-enter Discover at
    /// depth + 1; this node's own phase sequence ends at Define.
    Decompose,
    /// Define decided the node is atomic: proceed to Design.
    ProceedToDesign,
    /// Design (diverge) completed, move to Deliver (converge, validate).
    ProceedToDeliver,
    /// Deliver validated successfully.
    Complete,
}

pub struct DiamondStateMachine;

impl DiamondStateMachine {
    pub fn transition(
        current: DiamondPhase,
        event: DiamondTransition,
    ) -> Result<DiamondPhase, DomainError> {
        use DiamondPhase::*;
        use DiamondTransition::*;
        match (current, event) {
            (Discover, Converge) => Ok(Define),
            (Define, Decompose) => Ok(Done),
            (Define, ProceedToDesign) => Ok(Design),
            (Design, ProceedToDeliver) => Ok(Deliver),
            (Deliver, Complete) => Ok(Done),
            (state, transition) => Err(DomainError::InvalidTransition {
                current_state: format!("{state:?}"),
                attempted_transition: format!("{transition:?}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_path_runs_all_four_phases() {
        let mut phase = DiamondPhase::Discover;
        phase = DiamondStateMachine::transition(phase, DiamondTransition::Converge).unwrap();
        assert_eq!(phase, DiamondPhase::Define);
        phase = DiamondStateMachine::transition(phase, DiamondTransition::ProceedToDesign).unwrap();
        assert_eq!(phase, DiamondPhase::Design);
        phase = DiamondStateMachine::transition(phase, DiamondTransition::ProceedToDeliver).unwrap();
        assert_eq!(phase, DiamondPhase::Deliver);
        phase = DiamondStateMachine::transition(phase, DiamondTransition::Complete).unwrap();
        assert_eq!(phase, DiamondPhase::Done);
    }

    #[test]
    fn non_atomic_define_decomposes_instead_of_proceeding() {
        let phase = DiamondStateMachine::transition(DiamondPhase::Define, DiamondTransition::Decompose).unwrap();
        assert_eq!(phase, DiamondPhase::Done);
    }

    #[test]
    fn skipping_a_phase_is_an_invalid_transition() {
        let err = DiamondStateMachine::transition(DiamondPhase::Discover, DiamondTransition::ProceedToDeliver)
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));
    }
}
