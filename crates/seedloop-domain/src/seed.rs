//! The Seed: a frozen specification plus the ontology schema and evaluation
//! principles that evaluation and drift measurement are computed against.
//!
//! A `Seed` is immutable once constructed. `Seed::from_interview` is the only
//! constructor and enforces the ambiguity gate (`ambiguity_score <= 0.2`);
//! any later mutation attempt is a type error, not a runtime check, since
//! there is no setter to call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::ids::{ContentHash, SeedId};

/// Field types allowed in an ontology schema entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OntologyField {
    pub name: String,
    pub field_type: FieldType,
    pub description: String,
    #[serde(default)]
    pub required: bool,
}

/// Named mapping of field -> type/description/required, in declaration order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OntologySchema {
    pub fields: Vec<OntologyField>,
}

impl OntologySchema {
    pub fn field(&self, name: &str) -> Option<&OntologyField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationPrinciple {
    pub name: String,
    pub description: String,
    /// Weight in [0, 1]. Principles together form the basis of goal alignment
    /// scoring in the evaluation pipeline.
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedMetadata {
    pub ambiguity_score: f64,
    pub created_at: DateTime<Utc>,
    pub version: u32,
    #[serde(default)]
    pub context_references: Vec<String>,
}

/// An unvalidated draft, as loaded from a seed file or produced by the
/// (out-of-scope) interview collaborator. `Seed::from_interview` is the only
/// path from here to a frozen `Seed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedDraft {
    pub goal: String,
    pub constraints: Vec<String>,
    pub acceptance_criteria: Vec<String>,
    pub ontology_schema: OntologySchema,
    pub evaluation_principles: Vec<EvaluationPrinciple>,
    pub exit_conditions: Vec<String>,
    pub metadata: SeedMetadata,
}

impl SeedDraft {
    /// Parses the seed file format of spec §6: a YAML document with keys
    /// `goal, constraints[], acceptance_criteria[], ontology_schema{...},
    /// evaluation_principles[], exit_conditions[], metadata{...}`.
    pub fn from_yaml(raw: &str) -> Result<Self, DomainError> {
        serde_yaml::from_str(raw).map_err(|e| DomainError::ValidationError {
            reason: format!("seed file does not parse: {e}"),
        })
    }
}

/// Frozen specification. Once constructed, every field is read-only; the
/// only way to "derive" a new Seed is to build a new `SeedDraft` and call
/// `from_interview` again, producing a distinct `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seed {
    pub id: SeedId,
    pub goal: String,
    pub constraints: Vec<String>,
    pub acceptance_criteria: Vec<String>,
    pub ontology_schema: OntologySchema,
    pub evaluation_principles: Vec<EvaluationPrinciple>,
    pub exit_conditions: Vec<String>,
    pub metadata: SeedMetadata,
}

/// Seeds are created only when `ambiguity_score <= 0.2`; see spec §4.3 and
/// the boundary test in §8 (`0.2` allows, `0.20001` blocks).
pub const MAX_AMBIGUITY_SCORE: f64 = 0.2;

impl Seed {
    pub fn from_interview(draft: SeedDraft) -> Result<Self, DomainError> {
        if draft.metadata.ambiguity_score > MAX_AMBIGUITY_SCORE {
            return Err(DomainError::ValidationError {
                reason: format!(
                    "ambiguity_score {} exceeds the {} gate; seed creation blocked",
                    draft.metadata.ambiguity_score, MAX_AMBIGUITY_SCORE
                ),
            });
        }
        if draft.goal.trim().is_empty() {
            return Err(DomainError::ValidationError {
                reason: "goal must not be empty".to_string(),
            });
        }
        Ok(Self {
            id: SeedId::new(),
            goal: draft.goal,
            constraints: draft.constraints,
            acceptance_criteria: draft.acceptance_criteria,
            ontology_schema: draft.ontology_schema,
            evaluation_principles: draft.evaluation_principles,
            exit_conditions: draft.exit_conditions,
            metadata: draft.metadata,
        })
    }

    /// Any structure claiming to "be" this Seed must hash-equal it (spec
    /// §3's invariant on the Seed entity).
    pub fn content_hash(&self) -> ContentHash {
        let canonical =
            serde_json::to_vec(self).expect("Seed serializes; it contains no non-serializable fields");
        ContentHash::of_bytes(&canonical)
    }
}
