//! The append-only event record (spec §3, §4.1).
//!
//! `Event` is never updated or deleted once appended (I1). `event_type`
//! follows `aggregate.entity.verb_past_tense` dot notation (I2); the
//! constructor validates this shape so a malformed event type is a
//! construction-time error, not a silent corruption discovered at replay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ConsensusId, EventId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateType {
    Ontology,
    Execution,
    Consensus,
    Evolution,
    Routing,
    Resilience,
    Persistence,
}

impl AggregateType {
    fn as_str(self) -> &'static str {
        match self {
            AggregateType::Ontology => "ontology",
            AggregateType::Execution => "execution",
            AggregateType::Consensus => "consensus",
            AggregateType::Evolution => "evolution",
            AggregateType::Routing => "routing",
            AggregateType::Resilience => "resilience",
            AggregateType::Persistence => "persistence",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub aggregate_type: AggregateType,
    pub aggregate_id: String,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
    pub consensus_id: Option<ConsensusId>,
}

#[derive(Debug, thiserror::Error)]
pub enum EventConstructionError {
    #[error("event_type '{0}' does not match the dot.notation.past_tense convention")]
    MalformedEventType(String),
}

fn validate_event_type(event_type: &str) -> Result<(), EventConstructionError> {
    let parts: Vec<&str> = event_type.split('.').collect();
    let well_formed = parts.len() == 3
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_lowercase() || c == '_'));
    if well_formed {
        Ok(())
    } else {
        Err(EventConstructionError::MalformedEventType(event_type.to_string()))
    }
}

impl Event {
    pub fn new(
        aggregate_type: AggregateType,
        aggregate_id: impl Into<String>,
        event_type: impl Into<String>,
        payload: serde_json::Value,
        consensus_id: Option<ConsensusId>,
    ) -> Result<Self, EventConstructionError> {
        let event_type = event_type.into();
        validate_event_type(&event_type)?;
        Ok(Self {
            id: EventId::new(),
            aggregate_type,
            aggregate_id: aggregate_id.into(),
            event_type,
            timestamp: Utc::now(),
            payload,
            consensus_id,
        })
    }

    pub fn aggregate_type_str(&self) -> &'static str {
        self.aggregate_type.as_str()
    }
}

/// Canonical event-type strings used throughout the core. Kept centralized
/// so the router/evaluator/engine crates never hand-type a dotted string
/// more than once.
pub mod event_types {
    pub const TIER_ESCALATED: &str = "routing.tier.escalated";
    pub const TIER_DOWNGRADED: &str = "routing.tier.downgraded";
    pub const STAGNATION_DETECTED: &str = "resilience.stagnation.detected";
    pub const PERSONA_ROTATED: &str = "resilience.persona.rotated";
    pub const CHECKPOINT_ROLLED_BACK: &str = "persistence.checkpoint.rolled_back";
    pub const CHECKPOINT_ROTATED: &str = "persistence.checkpoint.rotated";
    pub const CONTEXT_COMPRESSED: &str = "execution.context.compressed";
    pub const ONTOLOGY_EVOLVED: &str = "ontology.schema.evolved";
    pub const DRIFT_MEASURED: &str = "evolution.drift.measured";
    pub const RETROSPECTIVE_RUN: &str = "evolution.retrospective.completed";
    pub const GENERATION_COMPLETED: &str = "evolution.generation.completed";
    /// Recorded once per lineage when a Seed is frozen, carrying the full
    /// `Seed` as its payload so a later `evolve_step` call can reconstruct it
    /// without the caller supplying the seed file again.
    pub const SEED_FROZEN: &str = "persistence.seed.frozen";
}
