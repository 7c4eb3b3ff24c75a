//! Stagnation and lateral-thinking value types (spec §3, §4.6). Detection and
//! persona-selection logic lives in `seedloop-engine`, which depends on this
//! crate for the shared vocabulary.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StagnationPattern {
    Spinning,
    Oscillation,
    NoDrift,
    DiminishingReturns,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagnationSignal {
    pub pattern: StagnationPattern,
    pub window: u32,
    pub evidence: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Persona {
    Hacker,
    Researcher,
    Simplifier,
    Architect,
    Contrarian,
}

impl Persona {
    /// All five, in a stable order used for deterministic fallback
    /// iteration when computing affinities.
    pub const ALL: [Persona; 5] = [
        Persona::Hacker,
        Persona::Researcher,
        Persona::Simplifier,
        Persona::Architect,
        Persona::Contrarian,
    ];

    /// Affinity table from spec §4.6. CONTRARIAN has affinity for every
    /// pattern ("challenges hidden assumptions"); the others are as listed.
    pub fn affinity(self, pattern: StagnationPattern) -> bool {
        use Persona::*;
        use StagnationPattern::*;
        match (self, pattern) {
            (Contrarian, _) => true,
            (Hacker, Spinning) => true,
            (Researcher, NoDrift) | (Researcher, DiminishingReturns) => true,
            (Simplifier, DiminishingReturns) | (Simplifier, Oscillation) => true,
            (Architect, Oscillation) | (Architect, NoDrift) => true,
            _ => false,
        }
    }
}
