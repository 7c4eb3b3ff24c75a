//! Evolutionary Loop decision core (spec §4.9): turns one generation's
//! measured signals into CONTINUE / CONVERGED / STAGNATED / EXHAUSTED /
//! FAILED.
//!
//! Deliberately pure and stateless: every invocation is handed everything it
//! needs and returns one `EvolutionAction`. Grounded on `governor.rs`'s
//! precondition-gating `try_start_iteration` — a decision made against an
//! explicit, caller-assembled snapshot rather than against live mutable
//! state — generalized from "is this iteration allowed to start" to "what
//! does this generation's outcome mean". Reconstructing that snapshot from
//! the Event Store is `facade`'s job, mirroring `event_manager.rs`'s
//! `rebuild(events)` replay idiom.

use seedloop_domain::{EvolutionAction, StagnationPattern};

#[derive(Debug, Clone, Copy)]
pub struct StepSignals {
    pub generation_number: u32,
    pub max_generations: u32,
    pub similarity_to_previous: f64,
    pub convergence_similarity: f64,
    pub exit_conditions_satisfied: bool,
    pub stagnation_pattern: Option<StagnationPattern>,
    pub stagnation_retries_exhausted: bool,
    pub consensus_aborted: bool,
    pub unrecoverable: bool,
    pub decomposition_exhausted: bool,
}

/// Decides the next action from one generation's measured signals.
///
/// Precedence (spec §4.9 names the five actions but not an order between
/// them; this workspace's choice, recorded in `DESIGN.md`): a decomposition
/// hard-limit hit wins over everything else, since it means the AC tree
/// itself is structurally stuck, not merely behind; an unrecoverable
/// failure wins over what remains; convergence is checked before exhaustion
/// so reaching the goal on the last allowed generation still counts as
/// success; a stagnation pattern with resilience exhausted is checked
/// before a bare generation-ceiling exhaustion; anything left over
/// continues to the next generation.
pub fn decide(signals: StepSignals) -> EvolutionAction {
    if signals.decomposition_exhausted {
        return EvolutionAction::DecompositionFailed;
    }
    if signals.unrecoverable || signals.consensus_aborted {
        return EvolutionAction::Failed;
    }
    if signals.similarity_to_previous >= signals.convergence_similarity && signals.exit_conditions_satisfied {
        return EvolutionAction::Converged;
    }
    if signals.stagnation_pattern.is_some() && signals.stagnation_retries_exhausted {
        return EvolutionAction::Stagnated;
    }
    if signals.generation_number > signals.max_generations {
        return EvolutionAction::Exhausted;
    }
    EvolutionAction::Continue
}

#[cfg(test)]
mod tests {
    use super::*;

    fn healthy_signals() -> StepSignals {
        StepSignals {
            generation_number: 1,
            max_generations: 30,
            similarity_to_previous: 0.5,
            convergence_similarity: 0.95,
            exit_conditions_satisfied: false,
            stagnation_pattern: None,
            stagnation_retries_exhausted: false,
            consensus_aborted: false,
            unrecoverable: false,
            decomposition_exhausted: false,
        }
    }

    #[test]
    fn healthy_generation_continues() {
        assert_eq!(decide(healthy_signals()), EvolutionAction::Continue);
    }

    #[test]
    fn similarity_at_threshold_with_exit_conditions_converges() {
        let signals = StepSignals {
            similarity_to_previous: 0.95,
            exit_conditions_satisfied: true,
            ..healthy_signals()
        };
        assert_eq!(decide(signals), EvolutionAction::Converged);
    }

    #[test]
    fn high_similarity_without_exit_conditions_does_not_converge() {
        let signals = StepSignals {
            similarity_to_previous: 0.99,
            exit_conditions_satisfied: false,
            ..healthy_signals()
        };
        assert_eq!(decide(signals), EvolutionAction::Continue);
    }

    #[test]
    fn stagnation_fires_only_once_retries_are_exhausted() {
        let retrying = StepSignals {
            stagnation_pattern: Some(StagnationPattern::Spinning),
            stagnation_retries_exhausted: false,
            ..healthy_signals()
        };
        assert_eq!(decide(retrying), EvolutionAction::Continue);

        let exhausted = StepSignals {
            stagnation_pattern: Some(StagnationPattern::Spinning),
            stagnation_retries_exhausted: true,
            ..healthy_signals()
        };
        assert_eq!(decide(exhausted), EvolutionAction::Stagnated);
    }

    #[test]
    fn exceeding_the_generation_ceiling_exhausts() {
        let signals = StepSignals {
            generation_number: 31,
            max_generations: 30,
            ..healthy_signals()
        };
        assert_eq!(decide(signals), EvolutionAction::Exhausted);
    }

    #[test]
    fn generation_at_the_ceiling_still_continues() {
        let signals = StepSignals {
            generation_number: 30,
            max_generations: 30,
            ..healthy_signals()
        };
        assert_eq!(decide(signals), EvolutionAction::Continue);
    }

    #[test]
    fn convergence_on_the_final_generation_wins_over_exhaustion() {
        let signals = StepSignals {
            generation_number: 31,
            max_generations: 30,
            similarity_to_previous: 0.97,
            exit_conditions_satisfied: true,
            ..healthy_signals()
        };
        assert_eq!(decide(signals), EvolutionAction::Converged);
    }

    #[test]
    fn unrecoverable_error_fails_regardless_of_other_signals() {
        let signals = StepSignals {
            similarity_to_previous: 0.99,
            exit_conditions_satisfied: true,
            unrecoverable: true,
            ..healthy_signals()
        };
        assert_eq!(decide(signals), EvolutionAction::Failed);
    }

    #[test]
    fn aborted_consensus_fails() {
        let signals = StepSignals {
            consensus_aborted: true,
            ..healthy_signals()
        };
        assert_eq!(decide(signals), EvolutionAction::Failed);
    }

    #[test]
    fn decomposition_exhaustion_wins_over_every_other_signal() {
        let signals = StepSignals {
            similarity_to_previous: 0.99,
            exit_conditions_satisfied: true,
            unrecoverable: true,
            decomposition_exhausted: true,
            ..healthy_signals()
        };
        assert_eq!(decide(signals), EvolutionAction::DecompositionFailed);
    }
}
