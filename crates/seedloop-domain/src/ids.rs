//! Newtype identifiers.
//!
//! Every aggregate gets a prefixed ULID identifier (`seed_<ULID>`,
//! `node_<ULID>`, ...) so that log lines and event payloads carry the
//! aggregate kind without a lookup. IDs are opaque strings to callers;
//! construction always goes through `new()` or `from_string()`.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

macro_rules! prefixed_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn new() -> Self {
                Self(format!(concat!($prefix, "_{}"), Ulid::new()))
            }

            pub fn from_string(s: String) -> Self {
                Self(s)
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

prefixed_id!(SeedId, "seed");
prefixed_id!(AcNodeId, "node");
prefixed_id!(EventId, "evt");
prefixed_id!(ConsensusId, "consensus");
prefixed_id!(CheckpointId, "ckpt");
prefixed_id!(LineageId, "lineage");

/// Content hash, format `sha256:<64-hex>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(String);

impl ContentHash {
    pub fn new(hex_digest: &str) -> Self {
        Self(format!("sha256:{hex_digest}"))
    }

    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn of_bytes(bytes: &[u8]) -> Self {
        use sha2::{Digest, Sha256};
        let digest = Sha256::digest(bytes);
        Self::new(&hex::encode(digest))
    }
}

/// Actor kind, mirrored on every event envelope for audit purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActorKind {
    Human,
    Agent,
    System,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorId {
    pub kind: ActorKind,
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_carry_their_prefix() {
        assert!(SeedId::new().as_str().starts_with("seed_"));
        assert!(AcNodeId::new().as_str().starts_with("node_"));
        assert!(LineageId::new().as_str().starts_with("lineage_"));
    }

    #[test]
    fn content_hash_of_bytes_is_deterministic() {
        let a = ContentHash::of_bytes(b"hello");
        let b = ContentHash::of_bytes(b"hello");
        assert_eq!(a, b);
    }
}
