//! The evaluation pipeline wrapped as "around-advice" (spec §4.7, §9): a
//! pre-analysis strategy runs before the core operation, cached by a
//! strategy-provided key. In strict mode a failed pre-analysis short-circuits
//! the wrapped operation entirely rather than letting it run unchecked.
//!
//! Kept as an explicit wrapper function over `(strategy, core_op)` rather
//! than a macro or trait-object decorator, matching the corpus's preference
//! for composition over attribute magic.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::errors::EvaluationError;

pub const CACHE_TTL: Duration = Duration::from_secs(5 * 60);
pub const CACHE_CAPACITY: usize = 100;

/// Outcome of running the active ontology strategy (Interview / Contrarian /
/// Devil) before the core operation.
#[derive(Debug, Clone)]
pub struct PreAnalysis {
    pub passed: bool,
    pub reason: String,
}

/// A strategy produces a cache key for its input and, on a cache miss, an
/// async pre-analysis.
pub trait OntologyStrategy: Send + Sync {
    fn cache_key(&self, input: &str) -> String;
    fn analyze(&self, input: &str) -> impl Future<Output = PreAnalysis> + Send;
}

#[derive(Clone)]
struct CacheEntry {
    analysis: PreAnalysis,
    inserted_at: Instant,
}

/// TTL/LRU-ish cache keyed by the strategy's cache key. Capacity eviction is
/// oldest-insertion-first; there is no read-refresh, matching a simple
/// bounded cache rather than a full LRU.
pub struct AspectCache {
    entries: Arc<Mutex<HashMap<String, CacheEntry>>>,
}

impl Default for AspectCache {
    fn default() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl AspectCache {
    async fn get(&self, key: &str) -> Option<PreAnalysis> {
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get(key) {
            if entry.inserted_at.elapsed() < CACHE_TTL {
                return Some(entry.analysis.clone());
            }
            entries.remove(key);
        }
        None
    }

    async fn put(&self, key: String, analysis: PreAnalysis) {
        let mut entries = self.entries.lock().await;
        if entries.len() >= CACHE_CAPACITY && !entries.contains_key(&key) {
            if let Some(oldest_key) = entries
                .iter()
                .min_by_key(|(_, v)| v.inserted_at)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&oldest_key);
            }
        }
        entries.insert(
            key,
            CacheEntry {
                analysis,
                inserted_at: Instant::now(),
            },
        );
    }
}

/// Strict mode short-circuits the core operation when pre-analysis fails;
/// permissive mode logs the failure and runs the core operation anyway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AspectMode {
    Strict,
    Permissive,
}

/// Wraps `core_op` with ontology-strategy pre-analysis. `input` is both what
/// the strategy analyzes and what it derives its cache key from.
pub async fn with_ontological_aspect<T, F, Fut>(
    strategy: &impl OntologyStrategy,
    cache: &AspectCache,
    mode: AspectMode,
    input: &str,
    core_op: F,
) -> Result<T, EvaluationError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    let key = strategy.cache_key(input);
    let analysis = match cache.get(&key).await {
        Some(cached) => cached,
        None => {
            let fresh = strategy.analyze(input).await;
            cache.put(key, fresh.clone()).await;
            fresh
        }
    };

    if !analysis.passed {
        tracing::warn!(reason = %analysis.reason, "ontology pre-analysis failed");
        if mode == AspectMode::Strict {
            return Err(EvaluationError::OntologicalViolation {
                reason: analysis.reason,
            });
        }
    }

    Ok(core_op().await)
}
