//! Mutable router state: the `PatternStats` map, escalation/downgrade, and
//! pattern-similarity inheritance (spec §4.4).
//!
//! Single writer (this struct), read-only elsewhere — spec §5's shared
//! resource discipline — grounded on the teacher's
//! `Arc<RwLock<HashMap<String, LoopTrackingState>>>` shape in `governor.rs`.

use std::collections::HashMap;
use std::sync::Arc;

use seedloop_domain::{PatternStats, RoutingDecision, TaskContext, Tier};
use tokio::sync::RwLock;

use crate::complexity::{complexity, tier_for};

const ESCALATE_AFTER_FAILURES: u32 = 2;
const DOWNGRADE_AFTER_SUCCESSES: u32 = 5;
const INHERITANCE_JACCARD_THRESHOLD: f64 = 0.80;

/// Whether the last attempt at a fingerprint succeeded or failed. The router
/// has no notion of "no outcome yet" — `route()` is called before an
/// attempt, outcomes are fed back in afterward via `record_outcome`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

pub struct RouterState {
    stats: Arc<RwLock<HashMap<String, PatternStats>>>,
}

impl Default for RouterState {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterState {
    pub fn new() -> Self {
        Self {
            stats: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Token-set Jaccard similarity between two fingerprints, where a
    /// fingerprint is itself a space-delimited token set per spec's
    /// "token-set derived key" (spec §3, §GLOSSARY).
    fn jaccard(a: &str, b: &str) -> f64 {
        use std::collections::HashSet;
        let set_a: HashSet<&str> = a.split_whitespace().collect();
        let set_b: HashSet<&str> = b.split_whitespace().collect();
        if set_a.is_empty() && set_b.is_empty() {
            return 1.0;
        }
        let intersection = set_a.intersection(&set_b).count();
        let union = set_a.union(&set_b).count();
        if union == 0 {
            0.0
        } else {
            intersection as f64 / union as f64
        }
    }

    /// Routes a task context to a tier, applying escalation, downgrade, and
    /// pattern inheritance. Tie-break resolution per spec §9's Open
    /// Question: "escalation preference wins" over a fresh complexity score.
    pub async fn route(&self, ctx: &TaskContext) -> RoutingDecision {
        let score = complexity(ctx);
        let fresh_tier = tier_for(score);

        let mut stats = self.stats.write().await;

        if !stats.contains_key(&ctx.fingerprint) {
            // Pattern inheritance: a fingerprint whose token set is >= 0.80
            // Jaccard-similar to an existing one adopts that fingerprint's
            // current_tier on first scoring (spec §4.4, §9 Open Question 3:
            // inherited read-only, all further writes are local).
            let inherited = stats
                .iter()
                .find(|(existing_fp, _)| Self::jaccard(existing_fp, &ctx.fingerprint) >= INHERITANCE_JACCARD_THRESHOLD)
                .map(|(_, existing_stats)| existing_stats.current_tier);

            stats.insert(
                ctx.fingerprint.clone(),
                PatternStats::fresh(inherited.unwrap_or(fresh_tier)),
            );
        }

        let entry = stats.get(&ctx.fingerprint).expect("just inserted or already present");

        // Escalation preference wins over a fresh complexity score (spec §9
        // Open Question 2).
        let tier = if entry.consecutive_failures >= ESCALATE_AFTER_FAILURES {
            entry.current_tier.promote()
        } else if entry.consecutive_successes >= DOWNGRADE_AFTER_SUCCESSES {
            entry.current_tier.demote()
        } else {
            entry.current_tier
        };

        let frontier_exhausted = entry.consecutive_failures >= ESCALATE_AFTER_FAILURES && tier == Tier::Frontier
            && entry.current_tier == Tier::Frontier;

        let rationale = format!(
            "complexity={score:.4}, fresh_tier={fresh_tier:?}, pattern_tier={:?}, failures={}, successes={}",
            entry.current_tier, entry.consecutive_failures, entry.consecutive_successes
        );

        if let Some(entry) = stats.get_mut(&ctx.fingerprint) {
            entry.current_tier = tier;
        }

        RoutingDecision {
            tier,
            complexity_score: score,
            rationale,
            fingerprint: ctx.fingerprint.clone(),
            frontier_exhausted,
        }
    }

    /// Feeds an execution outcome back into the fingerprint's counters.
    /// After any success, `failure_count = 0`; after any failure,
    /// `success_count = 0` (spec §8's quantified invariant).
    pub async fn record_outcome(&self, fingerprint: &str, outcome: Outcome) {
        let mut stats = self.stats.write().await;
        let entry = stats
            .entry(fingerprint.to_string())
            .or_insert_with(|| PatternStats::fresh(Tier::Frugal));
        match outcome {
            Outcome::Success => entry.record_success(),
            Outcome::Failure => entry.record_failure(),
        }
    }

    pub async fn snapshot(&self, fingerprint: &str) -> Option<PatternStats> {
        self.stats.read().await.get(fingerprint).cloned()
    }
}
