//! In-memory `EventStore`.
//!
//! Promoted from the test-double shape the teacher uses internally
//! (`governor.rs`'s `DummyEventStore`) to a real adapter: sufficient for any
//! single-process `evolve_step` invocation that doesn't need durability
//! across restarts, and for tests across the whole workspace.

use std::collections::HashMap;
use std::sync::Arc;

use seedloop_domain::Event;
use seedloop_ports::{EventExport, EventStore, EventStoreError};
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemoryEventStore {
    streams: Arc<RwLock<HashMap<String, Vec<Event>>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventStore for InMemoryEventStore {
    async fn append(&self, aggregate_id: &str, events: Vec<Event>) -> Result<(), EventStoreError> {
        let mut streams = self.streams.write().await;
        streams.entry(aggregate_id.to_string()).or_default().extend(events);
        Ok(())
    }

    async fn replay(&self, aggregate_id: &str) -> Result<Vec<Event>, EventStoreError> {
        let streams = self.streams.read().await;
        Ok(streams.get(aggregate_id).cloned().unwrap_or_default())
    }
}

impl EventExport for InMemoryEventStore {
    async fn query_events(
        &self,
        aggregate_type: Option<&str>,
        aggregate_id: Option<&str>,
        since: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<Vec<Event>, EventStoreError> {
        let streams = self.streams.read().await;
        let mut all: Vec<Event> = match aggregate_id {
            Some(id) => streams.get(id).cloned().unwrap_or_default(),
            None => streams.values().flatten().cloned().collect(),
        };
        if let Some(agg_type) = aggregate_type {
            all.retain(|e| e.aggregate_type_str() == agg_type);
        }
        if let Some(since) = since {
            all.retain(|e| e.timestamp >= since);
        }
        all.sort_by_key(|e| e.timestamp);
        Ok(all)
    }
}
