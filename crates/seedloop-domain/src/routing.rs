//! Data shapes shared between the domain and `seedloop-router`. The scoring
//! and escalation logic itself lives in `seedloop-router` (it needs no
//! domain-crate dependency beyond these value types), keeping this crate
//! free of anything that isn't a pure data definition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Frugal,
    Standard,
    Frontier,
}

impl Tier {
    /// Cost multipliers are fixed by tier: 1, 10, 30 (spec §3, §GLOSSARY).
    pub fn cost_multiplier(self) -> u32 {
        match self {
            Tier::Frugal => 1,
            Tier::Standard => 10,
            Tier::Frontier => 30,
        }
    }

    pub fn promote(self) -> Tier {
        match self {
            Tier::Frugal => Tier::Standard,
            Tier::Standard => Tier::Frontier,
            Tier::Frontier => Tier::Frontier,
        }
    }

    pub fn demote(self) -> Tier {
        match self {
            Tier::Frugal => Tier::Frugal,
            Tier::Standard => Tier::Frugal,
            Tier::Frontier => Tier::Standard,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskContext {
    pub token_count: u64,
    pub tool_count: u32,
    pub ac_depth: u8,
    pub fingerprint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub tier: Tier,
    pub complexity_score: f64,
    pub rationale: String,
    pub fingerprint: String,
    /// Set when the decision was a frontier failure that could not escalate
    /// further (spec §4.4's frontier-failure path); the caller is
    /// responsible for emitting `resilience.stagnation.detected`.
    pub frontier_exhausted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternStats {
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub current_tier: Tier,
    pub last_updated: DateTime<Utc>,
}

impl PatternStats {
    pub fn fresh(tier: Tier) -> Self {
        Self {
            consecutive_failures: 0,
            consecutive_successes: 0,
            current_tier: tier,
            last_updated: Utc::now(),
        }
    }

    pub fn record_success(&mut self) {
        self.consecutive_successes += 1;
        self.consecutive_failures = 0;
        self.last_updated = Utc::now();
    }

    pub fn record_failure(&mut self) {
        self.consecutive_failures += 1;
        self.consecutive_successes = 0;
        self.last_updated = Utc::now();
    }
}
