//! Pure complexity scoring and tier thresholds (spec §4.4).
//!
//! Both functions are side-effect-free: same `TaskContext`, same
//! `complexity_score` bits, every time. The mutable pattern-stats mapping
//! that escalation/downgrade rides on top of this lives in `state.rs`.

use seedloop_domain::{TaskContext, Tier};

const WEIGHT_TOKENS: f64 = 0.30;
const WEIGHT_TOOLS: f64 = 0.30;
const WEIGHT_DEPTH: f64 = 0.40;

const TOKEN_NORM_CEILING: f64 = 4000.0;
const TOOL_NORM_CEILING: f64 = 5.0;
const DEPTH_NORM_CEILING: f64 = 5.0;

const FRUGAL_CEILING: f64 = 0.4;
const STANDARD_CEILING: f64 = 0.7;

/// `complexity = 0.30*norm_tokens + 0.30*norm_tools + 0.40*norm_depth`
/// (spec §4.4, exact weights). Idempotent: calling this twice on the same
/// `ctx` yields identical bits because it touches no external state.
#[must_use]
pub fn complexity(ctx: &TaskContext) -> f64 {
    let norm_tokens = (ctx.token_count as f64 / TOKEN_NORM_CEILING).min(1.0);
    let norm_tools = (ctx.tool_count as f64 / TOOL_NORM_CEILING).min(1.0);
    let norm_depth = (ctx.ac_depth as f64 / DEPTH_NORM_CEILING).min(1.0);
    WEIGHT_TOKENS * norm_tokens + WEIGHT_TOOLS * norm_tools + WEIGHT_DEPTH * norm_depth
}

/// `< 0.4 -> FRUGAL; [0.4, 0.7] -> STANDARD; > 0.7 -> FRONTIER` (spec §4.4).
/// The high boundary is a strict `>`: `0.7` itself routes STANDARD (spec §8).
#[must_use]
pub fn tier_for(complexity_score: f64) -> Tier {
    if complexity_score < FRUGAL_CEILING {
        Tier::Frugal
    } else if complexity_score <= STANDARD_CEILING {
        Tier::Standard
    } else {
        Tier::Frontier
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn complexity_is_always_in_unit_interval(tokens in 0u64..1_000_000, tools in 0u32..1000, depth in 0u8..255) {
            let ctx = TaskContext { token_count: tokens, tool_count: tools, ac_depth: depth, fingerprint: "fp".into() };
            let score = complexity(&ctx);
            prop_assert!((0.0..=1.0).contains(&score));
        }

        #[test]
        fn complexity_is_deterministic(tokens in 0u64..1_000_000, tools in 0u32..1000, depth in 0u8..255) {
            let ctx = TaskContext { token_count: tokens, tool_count: tools, ac_depth: depth, fingerprint: "fp".into() };
            prop_assert_eq!(complexity(&ctx), complexity(&ctx));
        }
    }
}
