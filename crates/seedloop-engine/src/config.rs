//! Configuration surface (spec §6), following the teacher's
//! `*Config::from_env()` idiom (`sr-governor/src/config.rs`,
//! `sr-adapters/src/worker.rs::WorkerConfig`): every field has a documented
//! default and a matching `SEEDLOOP_*` environment variable.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    pub frugal_ceiling: f64,
    pub standard_ceiling: f64,
    pub weight_tokens: f64,
    pub weight_tools: f64,
    pub weight_depth: f64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            frugal_ceiling: 0.4,
            standard_ceiling: 0.7,
            weight_tokens: 0.3,
            weight_tools: 0.3,
            weight_depth: 0.4,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AtomicityConfig {
    pub complexity_ceiling: f64,
    pub tool_count_ceiling: u32,
    pub duration_ceiling_secs: u64,
}

impl Default for AtomicityConfig {
    fn default() -> Self {
        Self {
            complexity_ceiling: 0.7,
            tool_count_ceiling: 3,
            duration_ceiling_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AcTreeConfig {
    pub max_depth: u8,
    pub compression_depth: u8,
}

impl Default for AcTreeConfig {
    fn default() -> Self {
        Self { max_depth: 5, compression_depth: 3 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StagnationConfig {
    pub spinning_window: u32,
    pub oscillation_window: u32,
    pub no_drift_window: u32,
    pub diminishing_window: u32,
    pub max_retries: u32,
}

impl Default for StagnationConfig {
    fn default() -> Self {
        Self {
            spinning_window: 3,
            oscillation_window: 2,
            no_drift_window: 5,
            diminishing_window: 3,
            max_retries: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EvaluationConfig {
    pub mechanical_coverage_min: f64,
    pub semantic_pass_min: f64,
    pub semantic_goal_min: f64,
    pub semantic_drift_max: f64,
    pub semantic_uncertainty_max: f64,
    pub consensus_quorum_numerator: u32,
    pub consensus_quorum_denominator: u32,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            mechanical_coverage_min: 0.7,
            semantic_pass_min: 0.8,
            semantic_goal_min: 0.7,
            semantic_drift_max: 0.3,
            semantic_uncertainty_max: 0.3,
            consensus_quorum_numerator: 2,
            consensus_quorum_denominator: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DriftConfig {
    pub weight_goal: f64,
    pub weight_constraint: f64,
    pub weight_ontology: f64,
    pub threshold: f64,
    pub retrospective_every: u32,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            weight_goal: 0.5,
            weight_constraint: 0.3,
            weight_ontology: 0.2,
            threshold: 0.3,
            retrospective_every: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EvolutionConfig {
    pub max_generations: u32,
    pub convergence_similarity: f64,
    pub max_retries: u32,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            max_generations: 30,
            convergence_similarity: 0.95,
            max_retries: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ContextConfig {
    pub max_tokens: u64,
    pub max_age_hours: i64,
    pub recent_history: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_tokens: 100_000,
            max_age_hours: 6,
            recent_history: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CheckpointConfig {
    pub interval_secs: u64,
    pub max_rollback: usize,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self { interval_secs: 300, max_rollback: 3 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub max_initial_ctx_bytes: u64,
    pub max_response_bytes: u64,
    pub max_seed_bytes: u64,
    pub max_llm_resp_bytes: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_initial_ctx_bytes: 50_000,
            max_response_bytes: 10_000,
            max_seed_bytes: 1_000_000,
            max_llm_resp_bytes: 100_000,
        }
    }
}

/// Root configuration, one field group per spec §6 entry. Mirrors the
/// teacher's service-config shape but is read once at `evolve_step`
/// construction time rather than polled, since this core is a library
/// function, not a daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedLoopConfig {
    pub database_url: String,
    pub router: RouterConfig,
    pub atomicity: AtomicityConfig,
    pub ac_tree: AcTreeConfig,
    pub stagnation: StagnationConfig,
    pub evaluation: EvaluationConfig,
    pub drift: DriftConfig,
    pub evolution: EvolutionConfig,
    pub context: ContextConfig,
    pub checkpoint: CheckpointConfig,
    pub security: SecurityConfig,
    pub log_level: String,
}

impl Default for SeedLoopConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://seedloop.db".to_string(),
            router: RouterConfig::default(),
            atomicity: AtomicityConfig::default(),
            ac_tree: AcTreeConfig::default(),
            stagnation: StagnationConfig::default(),
            evaluation: EvaluationConfig::default(),
            drift: DriftConfig::default(),
            evolution: EvolutionConfig::default(),
            context: ContextConfig::default(),
            checkpoint: CheckpointConfig::default(),
            security: SecurityConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl SeedLoopConfig {
    /// Builds a config from environment variables, falling back to the
    /// documented defaults per field (spec §6's defaults-in-parentheses).
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            database_url: std::env::var("SEEDLOOP_DATABASE_URL").unwrap_or(defaults.database_url),
            router: RouterConfig {
                frugal_ceiling: env_f64("SEEDLOOP_ROUTER_FRUGAL_CEILING", defaults.router.frugal_ceiling),
                standard_ceiling: env_f64("SEEDLOOP_ROUTER_STANDARD_CEILING", defaults.router.standard_ceiling),
                weight_tokens: env_f64("SEEDLOOP_ROUTER_WEIGHT_TOKENS", defaults.router.weight_tokens),
                weight_tools: env_f64("SEEDLOOP_ROUTER_WEIGHT_TOOLS", defaults.router.weight_tools),
                weight_depth: env_f64("SEEDLOOP_ROUTER_WEIGHT_DEPTH", defaults.router.weight_depth),
            },
            atomicity: AtomicityConfig {
                complexity_ceiling: env_f64(
                    "SEEDLOOP_ATOMICITY_COMPLEXITY_CEILING",
                    defaults.atomicity.complexity_ceiling,
                ),
                tool_count_ceiling: env_u32(
                    "SEEDLOOP_ATOMICITY_TOOL_COUNT_CEILING",
                    defaults.atomicity.tool_count_ceiling,
                ),
                duration_ceiling_secs: env_u64(
                    "SEEDLOOP_ATOMICITY_DURATION_CEILING_SECS",
                    defaults.atomicity.duration_ceiling_secs,
                ),
            },
            ac_tree: AcTreeConfig {
                max_depth: env_u8("SEEDLOOP_AC_TREE_MAX_DEPTH", defaults.ac_tree.max_depth),
                compression_depth: env_u8(
                    "SEEDLOOP_AC_TREE_COMPRESSION_DEPTH",
                    defaults.ac_tree.compression_depth,
                ),
            },
            stagnation: defaults.stagnation,
            evaluation: defaults.evaluation,
            drift: DriftConfig {
                weight_goal: env_f64("SEEDLOOP_DRIFT_WEIGHT_GOAL", defaults.drift.weight_goal),
                weight_constraint: env_f64("SEEDLOOP_DRIFT_WEIGHT_CONSTRAINT", defaults.drift.weight_constraint),
                weight_ontology: env_f64("SEEDLOOP_DRIFT_WEIGHT_ONTOLOGY", defaults.drift.weight_ontology),
                threshold: env_f64("SEEDLOOP_DRIFT_THRESHOLD", defaults.drift.threshold),
                retrospective_every: env_u32(
                    "SEEDLOOP_DRIFT_RETROSPECTIVE_EVERY",
                    defaults.drift.retrospective_every,
                ),
            },
            evolution: EvolutionConfig {
                max_generations: env_u32("SEEDLOOP_EVOLUTION_MAX_GENERATIONS", defaults.evolution.max_generations),
                convergence_similarity: env_f64(
                    "SEEDLOOP_EVOLUTION_CONVERGENCE_SIMILARITY",
                    defaults.evolution.convergence_similarity,
                ),
                max_retries: env_u32("SEEDLOOP_EVOLUTION_MAX_RETRIES", defaults.evolution.max_retries),
            },
            context: defaults.context,
            checkpoint: defaults.checkpoint,
            security: defaults.security,
            log_level: std::env::var("SEEDLOOP_LOG_LEVEL").unwrap_or(defaults.log_level),
        }
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn env_u8(key: &str, default: u8) -> u8 {
    std::env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_section_6() {
        let cfg = SeedLoopConfig::default();
        assert_eq!(cfg.router.frugal_ceiling, 0.4);
        assert_eq!(cfg.atomicity.complexity_ceiling, 0.7);
        assert_eq!(cfg.ac_tree.max_depth, 5);
        assert_eq!(cfg.evaluation.mechanical_coverage_min, 0.7);
        assert_eq!(cfg.drift.threshold, 0.3);
        assert_eq!(cfg.evolution.max_generations, 30);
        assert_eq!(cfg.context.max_tokens, 100_000);
        assert_eq!(cfg.checkpoint.max_rollback, 3);
        assert_eq!(cfg.security.max_seed_bytes, 1_000_000);
    }
}
