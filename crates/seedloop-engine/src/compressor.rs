//! Context Compressor (spec §4.10). Triggers on age > 6h, tokens > 100k, or
//! depth ≥ 3. LLM summarization is the default path; a `ProviderError` falls
//! back to deterministic truncation that keeps only the Seed, current AC,
//! and top 5 facts.
//!
//! Grounded on `sr-domain/src/context.rs`'s `ContextCompiler::compile`,
//! generalized from a ref-resolution compiler to a token-budget compressor
//! since the LLM port is only available at this layer (`seedloop-domain`
//! must stay pure).

use std::future::Future;

use chrono::{DateTime, Utc};
use seedloop_domain::{event_types, AggregateType, CompressedContext, CompressorConfig, Event, FilteredContext};
use seedloop_ports::{LlmClient, LlmMessage, LlmParams, LlmResponseFormat, LlmRole, ProviderError};
use tracing::{instrument, warn};

const TOP_FACTS_ON_FALLBACK: usize = 5;

/// What the executor asks of its runner at depth ≥ `compression_depth`
/// (spec §4.5, §4.10). A thin seam so `executor.rs` doesn't need to know
/// about the LLM port directly — only `compress()` does.
pub trait ContextCompressor: Send + Sync {
    fn compress_context(&self, ctx: &FilteredContext, tokens_before: u64) -> impl Future<Output = CompressedContext> + Send;
}

/// One compression actually performed while planning a subtree, carrying
/// enough to emit an `execution.context.compressed` event at the façade.
#[derive(Debug, Clone)]
pub struct CompressionRecord {
    pub depth: u8,
    pub tokens_before: u64,
    pub tokens_after: u64,
    pub fallback_used: bool,
}

/// Whether compression should run at all, per spec §4.10's three triggers.
pub fn should_compress(ctx_age: DateTime<Utc>, now: DateTime<Utc>, token_count: u64, depth: u8, config: &CompressorConfig) -> bool {
    let age_hours = (now - ctx_age).num_hours();
    age_hours > config.max_age_hours || token_count > config.max_tokens || depth >= config.compression_depth
}

/// Compresses a `FilteredContext`, trying LLM summarization first and
/// falling back to deterministic truncation on `ProviderError`.
#[instrument(skip(llm, ctx))]
pub async fn compress(
    llm: &impl LlmClient,
    ctx: &FilteredContext,
    tokens_before: u64,
) -> CompressedContext {
    match summarize_with_llm(llm, ctx).await {
        Ok((key_facts, tokens_after)) => CompressedContext {
            seed_summary: ctx.seed_summary.clone(),
            current_ac: ctx.current_ac.clone(),
            recent_history: ctx.recent_history.clone(),
            key_facts,
            tokens_before,
            tokens_after,
            fallback_used: false,
        },
        Err(e) => {
            warn!(error = %e, "llm summarization failed, falling back to deterministic truncation");
            let key_facts: Vec<String> = ctx
                .relevant_facts
                .iter()
                .take(TOP_FACTS_ON_FALLBACK)
                .cloned()
                .collect();
            let tokens_after = estimate_tokens(&ctx.seed_summary) + estimate_tokens(&ctx.current_ac.text)
                + key_facts.iter().map(|f| estimate_tokens(f)).sum::<u64>();
            CompressedContext {
                seed_summary: ctx.seed_summary.clone(),
                current_ac: ctx.current_ac.clone(),
                recent_history: ctx.recent_history.clone(),
                key_facts,
                tokens_before,
                tokens_after,
                fallback_used: true,
            }
        }
    }
}

async fn summarize_with_llm(
    llm: &impl LlmClient,
    ctx: &FilteredContext,
) -> Result<(Vec<String>, u64), ProviderError> {
    let prompt = format!(
        "Summarize the key facts relevant to completing: {}\n\nContext: {}\nFacts: {}",
        ctx.current_ac.text,
        ctx.seed_summary,
        ctx.relevant_facts.join("; ")
    );
    let completion = llm
        .complete(
            vec![LlmMessage { role: LlmRole::User, content: prompt }],
            "standard-summarizer",
            LlmParams { temperature: 0.0, max_tokens: 512, response_format: LlmResponseFormat::Json },
        )
        .await?;

    let parsed: serde_json::Value =
        serde_json::from_str(&completion.content).map_err(|e| ProviderError::MalformedResponse { message: e.to_string() })?;
    let key_facts = parsed["key_facts"]
        .as_array()
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();
    Ok((key_facts, completion.completion_tokens as u64))
}

/// A cheap, CPU-bound approximation (whitespace-token count) — counting
/// tokens must not suspend a shared task (spec §5).
pub(crate) fn estimate_tokens(text: &str) -> u64 {
    text.split_whitespace().count() as u64
}

/// Builds the `execution.context.compressed` event per spec §4.10.
pub fn compression_event(aggregate_id: &str, before: u64, after: u64) -> Result<Event, seedloop_domain::EventConstructionError> {
    Event::new(
        AggregateType::Execution,
        aggregate_id,
        event_types::CONTEXT_COMPRESSED,
        serde_json::json!({ "tokens_before": before, "tokens_after": after }),
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use seedloop_domain::AcNode;
    use seedloop_ports::LlmCompletion;

    fn ctx() -> FilteredContext {
        FilteredContext::build(
            "print hello to stdout".to_string(),
            AcNode::root("implement hello world"),
            &[],
            vec!["fact one".to_string(), "fact two".to_string(), "fact three".to_string()],
        )
    }

    struct WorkingLlm;

    impl LlmClient for WorkingLlm {
        async fn complete(
            &self,
            _messages: Vec<LlmMessage>,
            _model: &str,
            _params: LlmParams,
        ) -> Result<LlmCompletion, ProviderError> {
            Ok(LlmCompletion {
                content: serde_json::json!({ "key_facts": ["summarized fact"] }).to_string(),
                model: "standard-summarizer".to_string(),
                prompt_tokens: 50,
                completion_tokens: 12,
            })
        }
    }

    struct FailingLlm;

    impl LlmClient for FailingLlm {
        async fn complete(
            &self,
            _messages: Vec<LlmMessage>,
            _model: &str,
            _params: LlmParams,
        ) -> Result<LlmCompletion, ProviderError> {
            Err(ProviderError::Unavailable { message: "offline".to_string() })
        }
    }

    #[tokio::test]
    async fn llm_summarization_path_does_not_fall_back() {
        let compressed = compress(&WorkingLlm, &ctx(), 1000).await;
        assert!(!compressed.fallback_used);
        assert_eq!(compressed.key_facts, vec!["summarized fact".to_string()]);
    }

    #[tokio::test]
    async fn llm_failure_falls_back_to_deterministic_truncation() {
        let compressed = compress(&FailingLlm, &ctx(), 1000).await;
        assert!(compressed.fallback_used);
        assert_eq!(compressed.key_facts.len(), 3);
    }

    #[test]
    fn triggers_on_depth_regardless_of_age_or_tokens() {
        let config = CompressorConfig::default();
        let now = Utc::now();
        assert!(should_compress(now, now, 0, 3, &config));
        assert!(!should_compress(now, now, 0, 2, &config));
    }

    #[test]
    fn triggers_on_token_ceiling() {
        let config = CompressorConfig::default();
        let now = Utc::now();
        assert!(should_compress(now, now, 100_001, 0, &config));
    }

    #[tokio::test]
    async fn fallback_truncation_is_idempotent_on_an_already_compressed_context() {
        let first = compress(&FailingLlm, &ctx(), 1000).await;
        let reconstructed = FilteredContext::build(
            first.seed_summary.clone(),
            first.current_ac.clone(),
            &first.recent_history,
            first.key_facts.clone(),
        );
        let second = compress(&FailingLlm, &reconstructed, first.tokens_after).await;
        assert_eq!(second.key_facts, first.key_facts);
    }
}
