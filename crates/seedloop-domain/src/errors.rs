//! Domain errors
//!
//! Every component contract returns a `Result`-shaped value with a closed
//! error variant set; exceptions are reserved for programming bugs, never
//! expected failure paths. This enum covers failures that originate inside
//! pure domain logic (construction, transitions, tree invariants). The
//! remaining abstract error kinds (ProviderError, PersistenceError,
//! CorruptionError, TimeoutError, StagnationError, ConsensusAborted) live in
//! the crates that own those concerns and are folded into `EngineError` only
//! at the orchestration boundary.

use thiserror::Error;

/// Domain errors for SeedLoop
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("validation error: {reason}")]
    ValidationError { reason: String },

    #[error("invalid state transition: cannot transition from {current_state} via {attempted_transition}")]
    InvalidTransition {
        current_state: String,
        attempted_transition: String,
    },

    #[error("invariant violation: {invariant}")]
    InvariantViolation { invariant: String },

    #[error("decomposition error: {reason}")]
    DecompositionError { reason: String },

    #[error("ontological violation: {reason}")]
    OntologicalViolation { reason: String },

    #[error("missing required reference: {ref_kind}")]
    MissingReference { ref_kind: String },
}
