//! `EngineError`: the unified error taxonomy at the façade boundary (spec
//! §7). Every collaborator error converts in via `#[from]`; the two kinds
//! owned only at this layer (`TimeoutError`, `StagnationError`) have no
//! lower-crate counterpart.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation error: {reason}")]
    Validation { reason: String },

    #[error(transparent)]
    Persistence(#[from] seedloop_ports::EventStoreError),

    #[error(transparent)]
    Checkpoint(#[from] seedloop_store::CheckpointError),

    #[error(transparent)]
    Evaluation(#[from] seedloop_evaluator::EvaluationError),

    #[error(transparent)]
    Provider(#[from] seedloop_ports::ProviderError),

    #[error(transparent)]
    Tooling(#[from] seedloop_ports::ToolError),

    #[error("operation timed out after {timeout_secs}s: {operation}")]
    Timeout { operation: String, timeout_secs: u64 },

    #[error("stagnation detector fired and resilience exhausted: {pattern:?}")]
    Stagnation { pattern: seedloop_domain::StagnationPattern },

    #[error(transparent)]
    EventConstruction(#[from] seedloop_domain::EventConstructionError),
}

impl From<seedloop_domain::DomainError> for EngineError {
    fn from(e: seedloop_domain::DomainError) -> Self {
        EngineError::Validation { reason: e.to_string() }
    }
}
