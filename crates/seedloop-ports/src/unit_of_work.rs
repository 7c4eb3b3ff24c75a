//! Unit-of-Work (spec §4.1): "`transaction(scope) → context` — scoped
//! resource with guaranteed release: buffers events in a Unit-of-Work; on
//! commit all events flush atomically and a checkpoint is written; on abort
//! the buffer is discarded." Per spec §5, all external mutation goes
//! through this; no other component writes directly.

use std::future::Future;

use seedloop_domain::{Checkpoint, Event};

use crate::{EventStore, EventStoreError};

/// The checkpoint half of a commit. Kept as a narrow trait here, rather than
/// depending on the concrete checkpoint-ring adapter, so this crate stays
/// free of a dependency on `seedloop-store`.
pub trait CheckpointSink: Send + Sync {
    fn write(&self, checkpoint: Checkpoint) -> impl Future<Output = ()> + Send;
}

/// A scoped buffer of events staged against one aggregate. Nothing is
/// visible to readers until `commit` flushes it; `abort` (or simply
/// dropping the value) discards it instead.
pub struct UnitOfWork<'a, ES: EventStore> {
    store: &'a ES,
    aggregate_id: String,
    buffered: Vec<Event>,
    finished: bool,
}

impl<'a, ES: EventStore> UnitOfWork<'a, ES> {
    pub(crate) fn new(store: &'a ES, aggregate_id: &str) -> Self {
        Self {
            store,
            aggregate_id: aggregate_id.to_string(),
            buffered: Vec::new(),
            finished: false,
        }
    }

    /// Buffers one event; nothing is written until `commit`.
    pub fn stage(&mut self, event: Event) {
        self.buffered.push(event);
    }

    /// Buffers several events at once.
    pub fn stage_all(&mut self, events: impl IntoIterator<Item = Event>) {
        self.buffered.extend(events);
    }

    pub fn staged(&self) -> &[Event] {
        &self.buffered
    }

    /// Flushes the buffer to the event store and writes a checkpoint,
    /// atomically: the append happens first, and the checkpoint is written
    /// only once it has succeeded, so a reader never observes a checkpoint
    /// whose events are not yet visible.
    pub async fn commit<CS: CheckpointSink>(mut self, checkpoint_sink: &CS, checkpoint: Checkpoint) -> Result<Vec<Event>, EventStoreError> {
        let events = std::mem::take(&mut self.buffered);
        self.store.append(&self.aggregate_id, events.clone()).await?;
        checkpoint_sink.write(checkpoint).await;
        self.finished = true;
        Ok(events)
    }

    /// Flushes the buffer without writing a checkpoint. Used at phase
    /// boundaries that have nothing yet worth snapshotting.
    pub async fn commit_without_checkpoint(mut self) -> Result<Vec<Event>, EventStoreError> {
        let events = std::mem::take(&mut self.buffered);
        self.store.append(&self.aggregate_id, events.clone()).await?;
        self.finished = true;
        Ok(events)
    }

    /// Discards the buffer. Equivalent to dropping the value, spelled out
    /// for callers that want the intent explicit at the call site.
    pub fn abort(mut self) {
        self.buffered.clear();
        self.finished = true;
    }
}

impl<ES: EventStore> Drop for UnitOfWork<'_, ES> {
    fn drop(&mut self) {
        if !self.finished && !self.buffered.is_empty() {
            tracing::warn!(
                aggregate_id = %self.aggregate_id,
                staged = self.buffered.len(),
                "unit of work dropped without commit or abort; staged events discarded"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use seedloop_domain::{AggregateType, Checkpoint};
    use tokio::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct FakeEventStore {
        appended: Mutex<Vec<(String, Vec<Event>)>>,
    }

    impl EventStore for FakeEventStore {
        async fn append(&self, aggregate_id: &str, events: Vec<Event>) -> Result<(), EventStoreError> {
            self.appended.lock().await.push((aggregate_id.to_string(), events));
            Ok(())
        }

        async fn replay(&self, _aggregate_id: &str) -> Result<Vec<Event>, EventStoreError> {
            Ok(vec![])
        }
    }

    #[derive(Default)]
    struct CountingCheckpointSink {
        writes: Arc<Mutex<u32>>,
    }

    impl CheckpointSink for CountingCheckpointSink {
        async fn write(&self, _checkpoint: Checkpoint) {
            *self.writes.lock().await += 1;
        }
    }

    fn event(aggregate_id: &str) -> Event {
        Event::new(AggregateType::Evolution, aggregate_id, "evolution.generation.completed", serde_json::Value::Null, None).unwrap()
    }

    fn checkpoint() -> Checkpoint {
        Checkpoint::new("seed_1".to_string(), "deliver".to_string(), 1, vec![])
    }

    #[tokio::test]
    async fn commit_flushes_events_and_writes_one_checkpoint() {
        let store = FakeEventStore::default();
        let sink = CountingCheckpointSink::default();
        let mut uow = store.transaction("lineage_1");
        uow.stage(event("lineage_1"));
        uow.stage(event("lineage_1"));
        let flushed = uow.commit(&sink, checkpoint()).await.unwrap();
        assert_eq!(flushed.len(), 2);
        assert_eq!(store.appended.lock().await.len(), 1);
        assert_eq!(*sink.writes.lock().await, 1);
    }

    #[tokio::test]
    async fn abort_discards_the_buffer_without_appending() {
        let store = FakeEventStore::default();
        let mut uow = store.transaction("lineage_1");
        uow.stage(event("lineage_1"));
        uow.abort();
        assert!(store.appended.lock().await.is_empty());
    }

    #[tokio::test]
    async fn dropping_without_commit_discards_silently_from_the_readers_perspective() {
        let store = FakeEventStore::default();
        {
            let mut uow = store.transaction("lineage_1");
            uow.stage(event("lineage_1"));
        }
        assert!(store.appended.lock().await.is_empty());
    }
}
