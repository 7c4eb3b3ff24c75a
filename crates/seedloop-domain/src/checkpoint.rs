//! Checkpoint value type (spec §3, §4.2). The rotation policy and recovery
//! logic live in `seedloop-store`; this crate only defines the shape and the
//! hash-verification predicate, since both the store and the engine need to
//! agree on what "valid" means.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::ContentHash;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub seed_id: String,
    pub phase: String,
    pub generation: u32,
    pub state_blob: Vec<u8>,
    pub content_hash: ContentHash,
    pub timestamp: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(seed_id: String, phase: String, generation: u32, state_blob: Vec<u8>) -> Self {
        let content_hash = ContentHash::of_bytes(&state_blob);
        Self {
            seed_id,
            phase,
            generation,
            state_blob,
            content_hash,
            timestamp: Utc::now(),
        }
    }

    /// `sha256(serialize(c.state)) == c.content_hash` (spec §8).
    pub fn is_valid(&self) -> bool {
        ContentHash::of_bytes(&self.state_blob) == self.content_hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freshly_built_checkpoint_is_valid() {
        let cp = Checkpoint::new("seed_1".into(), "discover".into(), 1, b"state".to_vec());
        assert!(cp.is_valid());
    }

    #[test]
    fn tampered_blob_invalidates_hash() {
        let mut cp = Checkpoint::new("seed_1".into(), "discover".into(), 1, b"state".to_vec());
        cp.state_blob = b"tampered".to_vec();
        assert!(!cp.is_valid());
    }
}
