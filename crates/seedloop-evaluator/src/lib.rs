//! Three-stage evaluation pipeline (spec §4.7): Mechanical, Semantic,
//! Consensus, wrapped in an ontological around-advice aspect.

pub mod aspect;
pub mod consensus;
pub mod errors;
pub mod mechanical;
pub mod semantic;
pub mod trigger;

pub use aspect::{AspectCache, AspectMode, OntologyStrategy, PreAnalysis, with_ontological_aspect};
pub use consensus::{
    deliberative_consensus, simple_consensus, DeliberativeRound, DevilsAdvocateResult,
    OntologicalProbe, Voter, VoterTimeouts, ONTOLOGICAL_PROBES,
};
pub use errors::EvaluationError;
pub use mechanical::{run_mechanical_stage, MechanicalCheck, MechanicalCheckResult, MechanicalStageResult};
pub use semantic::{run_semantic_stage, SemanticScores};
pub use trigger::{evaluate as evaluate_trigger_conditions, TriggerInputs};
