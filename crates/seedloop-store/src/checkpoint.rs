//! Checkpoint rotation and recovery (spec §4.2).
//!
//! Keeps four slots per `seed_id` (`current`, `-1`, `-2`, `-3`). On load, a
//! bad hash or parse failure rolls back to the next older slot, up to three
//! attempts total; past that, the caller is told to mark the lineage FAILED.

use std::collections::HashMap;
use std::sync::Arc;

use seedloop_domain::Checkpoint;
use seedloop_ports::CheckpointSink;
use thiserror::Error;
use tokio::sync::RwLock;

pub const MAX_ROLLBACK_DEPTH: usize = 3;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("no checkpoint found for seed {seed_id}")]
    NotFound { seed_id: String },

    #[error("checkpoint corrupted at every slot for seed {seed_id}: rollback exhausted after {attempts} attempts")]
    RollbackExhausted { seed_id: String, attempts: usize },
}

/// An in-process checkpoint ring. A durable implementation would persist
/// each slot to SQLite via `seedloop_ports::EventStore`'s sibling table; the
/// in-memory ring is what every `evolve_step` invocation uses directly since
/// spec §4.2's rotation is itself expressed purely in terms of "slot
/// contents", not storage medium.
#[derive(Default)]
pub struct CheckpointStore {
    slots: Arc<RwLock<HashMap<String, Vec<Checkpoint>>>>,
}

/// Outcome of a load that may have had to roll back.
pub struct Recovered {
    pub checkpoint: Checkpoint,
    pub rollback_depth: usize,
}

impl CheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes a new checkpoint, pushing older ones down the ring and
    /// dropping anything past slot `-3`.
    pub async fn write(&self, checkpoint: Checkpoint) {
        let mut slots = self.slots.write().await;
        let ring = slots.entry(checkpoint.seed_id.clone()).or_default();
        ring.insert(0, checkpoint);
        ring.truncate(MAX_ROLLBACK_DEPTH + 1);
    }

    /// Loads the latest valid checkpoint for a seed, rolling back through
    /// the ring on hash mismatch, up to `MAX_ROLLBACK_DEPTH` times.
    pub async fn load_latest_valid(&self, seed_id: &str) -> Result<Recovered, CheckpointError> {
        let slots = self.slots.read().await;
        let ring = slots.get(seed_id).ok_or_else(|| CheckpointError::NotFound {
            seed_id: seed_id.to_string(),
        })?;

        for (depth, checkpoint) in ring.iter().enumerate().take(MAX_ROLLBACK_DEPTH + 1) {
            if checkpoint.is_valid() {
                return Ok(Recovered {
                    checkpoint: checkpoint.clone(),
                    rollback_depth: depth,
                });
            }
        }

        Err(CheckpointError::RollbackExhausted {
            seed_id: seed_id.to_string(),
            attempts: MAX_ROLLBACK_DEPTH,
        })
    }
}

/// Lets `CheckpointStore` act as the checkpoint half of a
/// `seedloop_ports::UnitOfWork::commit`. Delegates to the inherent `write`
/// above (Rust resolves `self.write(...)` to it, not back to this trait
/// method, so there is no recursion).
impl CheckpointSink for CheckpointStore {
    async fn write(&self, checkpoint: Checkpoint) {
        CheckpointStore::write(self, checkpoint).await
    }
}
