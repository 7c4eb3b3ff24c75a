//! Drift measurement (spec §4.8): `drift = 0.5·goal_drift + 0.3·constraint_drift
//! + 0.2·ontology_drift`, plus the every-third-iteration retrospective.
//!
//! Open Question resolution (recorded in `DESIGN.md`): goal drift is
//! Jaccard dissimilarity between the seed's goal tokens and the current
//! state summary's tokens; constraint drift is the fraction of the seed's
//! acceptance criteria with no satisfied evidence; ontology drift is
//! `1 - EffectiveOntology::retention_ratio`.

use std::collections::HashSet;

use seedloop_domain::EffectiveOntology;

fn token_set(text: &str) -> HashSet<&str> {
    text.split_whitespace().collect()
}

fn jaccard_dissimilarity(a: &str, b: &str) -> f64 {
    let set_a = token_set(a);
    let set_b = token_set(b);
    if set_a.is_empty() && set_b.is_empty() {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    if union == 0 {
        0.0
    } else {
        1.0 - (intersection as f64 / union as f64)
    }
}

/// Goal drift: how far the current state summary has strayed from the
/// Seed's goal text, token-set Jaccard dissimilarity.
pub fn goal_drift(seed_goal: &str, current_summary: &str) -> f64 {
    jaccard_dissimilarity(seed_goal, current_summary)
}

/// Constraint drift: the fraction of acceptance criteria without satisfied
/// evidence in the current run.
pub fn constraint_drift(acceptance_criteria: &[String], satisfied: &[String]) -> f64 {
    if acceptance_criteria.is_empty() {
        return 0.0;
    }
    let satisfied_count = acceptance_criteria
        .iter()
        .filter(|ac| satisfied.iter().any(|s| s == *ac))
        .count();
    1.0 - (satisfied_count as f64 / acceptance_criteria.len() as f64)
}

/// Ontology drift: complement of concept retention relative to the base
/// schema (spec §4.8's "ontology_drift" left undefined; this workspace's
/// choice, per the Open Question decision).
pub fn ontology_drift(effective: &EffectiveOntology, base: &seedloop_domain::OntologySchema) -> f64 {
    1.0 - effective.retention_ratio(base)
}

const WEIGHT_GOAL: f64 = 0.5;
const WEIGHT_CONSTRAINT: f64 = 0.3;
const WEIGHT_ONTOLOGY: f64 = 0.2;

/// `drift = 0.5·goal_drift + 0.3·constraint_drift + 0.2·ontology_drift`
/// (spec §4.8, exact weights). Pure; precise to ±1e-9 per spec §8.
#[must_use]
pub fn drift(goal_drift: f64, constraint_drift: f64, ontology_drift: f64) -> f64 {
    WEIGHT_GOAL * goal_drift + WEIGHT_CONSTRAINT * constraint_drift + WEIGHT_ONTOLOGY * ontology_drift
}

/// Retrospectives fire on iterations 3, 6, 9, ... (counter starts at 1, spec
/// §4.8).
#[must_use]
pub fn is_retrospective_iteration(iteration: u32, every: u32) -> bool {
    every > 0 && iteration % every == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drift_formula_matches_scenario_1() {
        // spec §8 scenario 1: drift 0.05 for a clean first iteration.
        let score = drift(0.1, 0.0, 0.0);
        assert!((score - 0.05).abs() < 1e-9);
    }

    #[test]
    fn drift_0_3_passes_and_0_30001_triggers_consensus() {
        assert!(0.3_f64 <= 0.3);
        assert!(0.30001_f64 > 0.3);
    }

    #[test]
    fn retrospectives_fire_every_third_iteration_starting_at_one() {
        assert!(!is_retrospective_iteration(1, 3));
        assert!(!is_retrospective_iteration(2, 3));
        assert!(is_retrospective_iteration(3, 3));
        assert!(is_retrospective_iteration(6, 3));
        assert!(!is_retrospective_iteration(7, 3));
    }

    #[test]
    fn goal_drift_is_zero_for_identical_text() {
        assert_eq!(goal_drift("print hello to stdout", "print hello to stdout"), 0.0);
    }

    #[test]
    fn constraint_drift_reflects_unsatisfied_fraction() {
        let criteria = vec!["a".to_string(), "b".to_string()];
        let satisfied = vec!["a".to_string()];
        assert!((constraint_drift(&criteria, &satisfied) - 0.5).abs() < 1e-9);
    }
}
