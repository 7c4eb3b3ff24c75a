//! SeedLoop Domain Core
//!
//! Pure domain logic for the evolutionary workflow engine: the Seed and its
//! ontology, the acceptance-criterion tree, the append-only event record,
//! checkpoints, generations, and the value types shared by the router,
//! evaluator, and engine crates.
//!
//! This crate MUST NOT import DB clients, HTTP frameworks, or LLM SDKs — see
//! `seedloop-ports` for the trait boundaries those concerns live behind.

pub mod ac_tree;
pub mod checkpoint;
pub mod context;
pub mod errors;
pub mod evaluation;
pub mod events;
pub mod generation;
pub mod ids;
pub mod ontology;
pub mod routing;
pub mod seed;
pub mod stagnation;
pub mod state_machines;

pub use ac_tree::*;
pub use checkpoint::*;
pub use context::*;
pub use errors::*;
pub use evaluation::*;
pub use events::*;
pub use generation::*;
pub use ids::*;
pub use ontology::*;
pub use routing::*;
pub use seed::*;
pub use stagnation::*;
pub use state_machines::*;
