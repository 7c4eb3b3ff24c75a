//! Evaluator error taxonomy (abstract kinds 2, 8, 9 of spec §7: ProviderError
//! is re-exported from `seedloop-ports`; ConsensusAborted and
//! OntologicalViolation are owned here since they only occur inside the
//! pipeline).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("tool missing or execution failed: {0}")]
    Tooling(#[from] seedloop_ports::ToolError),

    #[error("provider error: {0}")]
    Provider(#[from] seedloop_ports::ProviderError),

    #[error("consensus aborted: {reason}")]
    ConsensusAborted { reason: String },

    #[error("ontological violation: {reason}")]
    OntologicalViolation { reason: String },
}
