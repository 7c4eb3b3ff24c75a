//! Evolvable ontology: a base schema plus an ordered log of `OntologyEvent`s.
//!
//! `EffectiveOntology` is a pure projection — it is derivable only by replay,
//! never mutated in place, mirroring the event-sourced projections elsewhere
//! in this workspace.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ids::ConsensusId;
use crate::seed::{FieldType, OntologyField, OntologySchema};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OntologyEventKind {
    ConceptAdded { field: OntologyField },
    ConceptRemoved { name: String },
    WeightModified { name: String, new_weight: f64 },
    ExcludeAdded { name: String },
}

/// An ontology mutation, authorized by a consensus outcome (spec §3: "each
/// carrying the `consensus_id` that authorized them").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OntologyEvent {
    pub kind: OntologyEventKind,
    pub consensus_id: ConsensusId,
}

/// The logical view: base ontology + replayed events.
#[derive(Debug, Clone, Default)]
pub struct EffectiveOntology {
    pub fields: BTreeMap<String, OntologyField>,
    pub excluded: Vec<String>,
    pub version: u32,
}

impl EffectiveOntology {
    /// Rebuilds the effective ontology from the base schema and the ordered
    /// event log. No other constructor exists; there is no in-place
    /// mutation API.
    pub fn replay(base: &OntologySchema, events: &[OntologyEvent]) -> Self {
        let mut fields: BTreeMap<String, OntologyField> = base
            .fields
            .iter()
            .map(|f| (f.name.clone(), f.clone()))
            .collect();
        let mut excluded = Vec::new();
        for event in events {
            match &event.kind {
                OntologyEventKind::ConceptAdded { field } => {
                    fields.insert(field.name.clone(), field.clone());
                }
                OntologyEventKind::ConceptRemoved { name } => {
                    fields.remove(name);
                }
                OntologyEventKind::WeightModified { .. } => {
                    // Weight is a property of evaluation principles, not of
                    // ontology fields; recorded for audit but has no effect
                    // on the field map itself.
                }
                OntologyEventKind::ExcludeAdded { name } => {
                    if !excluded.contains(name) {
                        excluded.push(name.clone());
                    }
                }
            }
        }
        Self {
            fields,
            excluded,
            version: events.len() as u32,
        }
    }

    /// Concepts retained relative to the base schema, used by ontology-drift
    /// measurement (spec §4.8).
    pub fn retention_ratio(&self, base: &OntologySchema) -> f64 {
        if base.fields.is_empty() {
            return 1.0;
        }
        let retained = base
            .fields
            .iter()
            .filter(|f| self.fields.contains_key(&f.name))
            .count();
        retained as f64 / base.fields.len() as f64
    }

    pub fn field_type(&self, name: &str) -> Option<FieldType> {
        self.fields.get(name).map(|f| f.field_type)
    }
}
