//! The six-condition trigger matrix gating Stage 3 (spec §4.7). Any one
//! condition firing routes the pipeline into consensus instead of returning
//! the Stage 2 verdict directly.

use seedloop_domain::{EvaluationResult, TriggerConditions};

use crate::semantic::UNCERTAINTY_MAX_STANDARD;

/// Inputs the executor already has in hand at the point Stage 2 completes;
/// kept as plain fields rather than a trait so callers can construct it
/// without implementing anything.
#[derive(Debug, Clone, Default)]
pub struct TriggerInputs {
    pub seed_modification_proposed: bool,
    pub ontology_evolution: bool,
    pub goal_reinterpretation: bool,
    pub drift_threshold: f64,
    pub lateral_suggestion_adopted: bool,
}

/// Builds the trigger matrix from the Stage 2 result plus the executor's
/// own bookkeeping, then evaluates `any_fired()`.
pub fn evaluate(semantic: &EvaluationResult, inputs: &TriggerInputs) -> TriggerConditions {
    TriggerConditions {
        seed_modification_proposed: inputs.seed_modification_proposed,
        ontology_evolution: inputs.ontology_evolution,
        goal_reinterpretation: inputs.goal_reinterpretation,
        drift_exceeds_threshold: semantic.drift_score > inputs.drift_threshold,
        stage2_uncertainty_exceeds_threshold: semantic.uncertainty > UNCERTAINTY_MAX_STANDARD,
        lateral_suggestion_adopted: inputs.lateral_suggestion_adopted,
    }
}
