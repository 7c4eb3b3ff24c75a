//! Stage 2 — Semantic (Standard tier), spec §4.7.
//!
//! Scores `ac_compliance, goal_alignment, drift, uncertainty` via the LLM
//! port. Falls back to FRUGAL when STANDARD is unavailable, tightening the
//! uncertainty bar from 0.3 to 0.2 and logging the fallback.

use seedloop_domain::{EvaluationResult, EvaluationStage, Tier};
use seedloop_ports::{LlmClient, LlmMessage, LlmParams, LlmResponseFormat, LlmRole, ProviderError};
use tracing::{instrument, warn};

pub const PASS_SCORE_MIN: f64 = 0.8;
pub const GOAL_ALIGNMENT_MIN: f64 = 0.7;
pub const DRIFT_MAX: f64 = 0.3;
pub const UNCERTAINTY_MAX_STANDARD: f64 = 0.3;
pub const UNCERTAINTY_MAX_FRUGAL_FALLBACK: f64 = 0.2;

/// Raw semantic scores as returned by the LLM, before the pass/fail
/// decision is applied.
#[derive(Debug, Clone, Copy)]
pub struct SemanticScores {
    pub ac_compliance: bool,
    pub score: f64,
    pub goal_alignment: f64,
    pub drift: f64,
    pub uncertainty: f64,
}

fn decide(scores: SemanticScores, uncertainty_max: f64) -> bool {
    scores.ac_compliance
        && scores.score >= PASS_SCORE_MIN
        && scores.goal_alignment >= GOAL_ALIGNMENT_MIN
        && scores.drift <= DRIFT_MAX
        && scores.uncertainty <= uncertainty_max
}

/// Runs Stage 2 against the Standard tier first; on `ProviderError` (the
/// tier being unavailable), retries at Frugal with the tightened
/// uncertainty bar and logs the fallback.
#[instrument(skip(llm, scorer_prompt))]
pub async fn run_semantic_stage(
    llm: &impl LlmClient,
    scorer_prompt: &str,
) -> Result<EvaluationResult, ProviderError> {
    let standard_attempt = score_with_tier(llm, scorer_prompt, Tier::Standard).await;

    let (scores, uncertainty_max, tier_used) = match standard_attempt {
        Ok(scores) => (scores, UNCERTAINTY_MAX_STANDARD, Tier::Standard),
        Err(e) => {
            warn!(error = %e, "standard tier unavailable for semantic stage, falling back to frugal");
            let fallback = score_with_tier(llm, scorer_prompt, Tier::Frugal).await?;
            (fallback, UNCERTAINTY_MAX_FRUGAL_FALLBACK, Tier::Frugal)
        }
    };

    let passed = decide(scores, uncertainty_max);

    Ok(EvaluationResult {
        stage: EvaluationStage::Semantic,
        passed,
        ac_compliance: if scores.ac_compliance { 1.0 } else { 0.0 },
        goal_alignment: scores.goal_alignment,
        drift_score: scores.drift,
        uncertainty: scores.uncertainty,
        reasoning: format!("scored at {tier_used:?} tier"),
        cost_units: tier_used.cost_multiplier(),
    })
}

async fn score_with_tier(
    llm: &impl LlmClient,
    scorer_prompt: &str,
    tier: Tier,
) -> Result<SemanticScores, ProviderError> {
    let model = match tier {
        Tier::Frugal => "frugal-scorer",
        Tier::Standard => "standard-scorer",
        Tier::Frontier => "frontier-scorer",
    };
    let completion = llm
        .complete(
            vec![LlmMessage {
                role: LlmRole::User,
                content: scorer_prompt.to_string(),
            }],
            model,
            LlmParams {
                temperature: 0.0,
                max_tokens: 512,
                response_format: LlmResponseFormat::Json,
            },
        )
        .await?;

    let parsed: serde_json::Value =
        serde_json::from_str(&completion.content).map_err(|e| ProviderError::MalformedResponse {
            message: e.to_string(),
        })?;

    Ok(SemanticScores {
        ac_compliance: parsed["ac_compliance"].as_bool().unwrap_or(false),
        score: parsed["score"].as_f64().unwrap_or(0.0),
        goal_alignment: parsed["goal_alignment"].as_f64().unwrap_or(0.0),
        drift: parsed["drift"].as_f64().unwrap_or(1.0),
        uncertainty: parsed["uncertainty"].as_f64().unwrap_or(1.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use seedloop_ports::LlmCompletion;

    struct StandardOnly;

    impl LlmClient for StandardOnly {
        async fn complete(
            &self,
            _messages: Vec<LlmMessage>,
            model: &str,
            _params: LlmParams,
        ) -> Result<LlmCompletion, ProviderError> {
            assert_eq!(model, "standard-scorer");
            Ok(LlmCompletion {
                content: serde_json::json!({
                    "ac_compliance": true, "score": 0.91, "goal_alignment": 0.8, "drift": 0.05, "uncertainty": 0.12
                })
                .to_string(),
                model: model.to_string(),
                prompt_tokens: 10,
                completion_tokens: 10,
            })
        }
    }

    struct StandardUnavailable;

    impl LlmClient for StandardUnavailable {
        async fn complete(
            &self,
            _messages: Vec<LlmMessage>,
            model: &str,
            _params: LlmParams,
        ) -> Result<LlmCompletion, ProviderError> {
            if model == "standard-scorer" {
                return Err(ProviderError::Unavailable {
                    message: "standard tier offline".to_string(),
                });
            }
            Ok(LlmCompletion {
                content: serde_json::json!({
                    "ac_compliance": true, "score": 0.85, "goal_alignment": 0.75, "drift": 0.1, "uncertainty": 0.15
                })
                .to_string(),
                model: model.to_string(),
                prompt_tokens: 10,
                completion_tokens: 10,
            })
        }
    }

    #[tokio::test]
    async fn scenario_1_passes_with_no_consensus_needed() {
        let result = run_semantic_stage(&StandardOnly, "score this").await.unwrap();
        assert!(result.passed);
        assert_eq!(result.uncertainty, 0.12);
    }

    #[tokio::test]
    async fn falls_back_to_frugal_with_tightened_uncertainty_bar() {
        let result = run_semantic_stage(&StandardUnavailable, "score this").await.unwrap();
        // uncertainty 0.15 <= 0.2 fallback bar, so it still passes
        assert!(result.passed);
        assert_eq!(result.cost_units, Tier::Frugal.cost_multiplier());
    }
}
