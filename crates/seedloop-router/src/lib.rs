//! PAL tier router (spec §4.4): pure complexity scoring feeding a
//! single-writer pattern-stats map that applies escalation, downgrade, and
//! Jaccard-similarity pattern inheritance.

pub mod complexity;
pub mod state;

pub use complexity::{complexity, tier_for};
pub use state::{Outcome, RouterState};
