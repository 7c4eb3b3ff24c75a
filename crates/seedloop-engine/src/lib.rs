//! Evolutionary loop orchestration core.
//!
//! This crate owns everything between the pure domain types
//! (`seedloop-domain`) and the outer interfaces (`seedloop-ports`): the
//! Double-Diamond executor, stagnation detection and lateral thinking,
//! drift measurement, the context compressor, input-size security limits,
//! runtime configuration, and the `evolve_step` façade that ties them all
//! together with the router and evaluator crates.

pub mod compressor;
pub mod config;
pub mod drift;
pub mod error;
pub mod executor;
pub mod facade;
pub mod loop_driver;
pub mod security;
pub mod stagnation;

pub use config::SeedLoopConfig;
pub use error::EngineError;
pub use executor::{execute_node, ExecutionError, PhaseOutput, PhaseRunner};
pub use facade::{evolve_step, EvolveStepRequest, EvolveStepResponse};
pub use loop_driver::{decide as decide_evolution_action, StepSignals};
