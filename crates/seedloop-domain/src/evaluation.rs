//! Evaluation and consensus result shapes (spec §3, §4.7).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationStage {
    Mechanical,
    Semantic,
    Consensus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub stage: EvaluationStage,
    pub passed: bool,
    pub ac_compliance: f64,
    pub goal_alignment: f64,
    pub drift_score: f64,
    pub uncertainty: f64,
    pub reasoning: String,
    pub cost_units: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusMode {
    Simple,
    Deliberative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Approved,
    Rejected,
    Conditional,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoterResult {
    pub voter: String,
    pub approved: bool,
    pub confidence: f64,
    pub reasoning: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusOutcome {
    pub mode: ConsensusMode,
    pub votes: Vec<VoterResult>,
    pub verdict: Verdict,
    pub conditions: Vec<String>,
}

/// The six trigger-matrix conditions of spec §4.7. Any one of them firing
/// gates Stage 3 (consensus).
#[derive(Debug, Clone, Default)]
pub struct TriggerConditions {
    pub seed_modification_proposed: bool,
    pub ontology_evolution: bool,
    pub goal_reinterpretation: bool,
    pub drift_exceeds_threshold: bool,
    pub stage2_uncertainty_exceeds_threshold: bool,
    pub lateral_suggestion_adopted: bool,
}

impl TriggerConditions {
    pub fn any_fired(&self) -> bool {
        self.seed_modification_proposed
            || self.ontology_evolution
            || self.goal_reinterpretation
            || self.drift_exceeds_threshold
            || self.stage2_uncertainty_exceeds_threshold
            || self.lateral_suggestion_adopted
    }
}
