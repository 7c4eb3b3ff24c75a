//! SQLite-backed `EventStore`.
//!
//! Grounded on the teacher's `postgres.rs` transactional-append pattern.
//! The row-level lock the teacher takes (`SELECT ... FOR UPDATE`) is dropped:
//! spec §5 states plainly that there is no cross-process locking requirement
//! and the store is single-process, so a plain transaction boundary already
//! gives atomicity without a lock this workload never contends for.

use chrono::{DateTime, Utc};
use seedloop_domain::{AggregateType, ConsensusId, Event, EventId};
use seedloop_ports::{EventExport, EventStore, EventStoreError};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::{debug, error, instrument};

pub struct SqliteEventStore {
    pool: SqlitePool,
}

impl SqliteEventStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, EventStoreError> {
        let pool = SqlitePool::connect(database_url)
            .await
            .map_err(|e| EventStoreError::ConnectionError {
                message: e.to_string(),
            })?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Creates the single `events` table of spec §4.1, with the indexes it
    /// names: `aggregate_type`, `aggregate_id`, `(aggregate_type,
    /// aggregate_id)`, `event_type`, `timestamp`.
    async fn migrate(&self) -> Result<(), EventStoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id TEXT PRIMARY KEY,
                aggregate_type TEXT NOT NULL,
                aggregate_id TEXT NOT NULL,
                event_type TEXT NOT NULL,
                payload TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                consensus_id TEXT,
                stream_seq INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| EventStoreError::ConnectionError {
            message: e.to_string(),
        })?;

        for (name, expr) in [
            ("idx_events_aggregate_type", "aggregate_type"),
            ("idx_events_aggregate_id", "aggregate_id"),
            ("idx_events_aggregate_composite", "aggregate_type, aggregate_id"),
            ("idx_events_event_type", "event_type"),
            ("idx_events_timestamp", "timestamp"),
        ] {
            sqlx::query(&format!("CREATE INDEX IF NOT EXISTS {name} ON events ({expr})"))
                .execute(&self.pool)
                .await
                .map_err(|e| EventStoreError::ConnectionError {
                    message: e.to_string(),
                })?;
        }
        Ok(())
    }
}

fn row_to_event(row: &SqliteRow) -> Result<Event, EventStoreError> {
    let aggregate_type_str: String = row.get("aggregate_type");
    let aggregate_type = match aggregate_type_str.as_str() {
        "ontology" => AggregateType::Ontology,
        "execution" => AggregateType::Execution,
        "consensus" => AggregateType::Consensus,
        "evolution" => AggregateType::Evolution,
        "routing" => AggregateType::Routing,
        "resilience" => AggregateType::Resilience,
        "persistence" => AggregateType::Persistence,
        other => {
            return Err(EventStoreError::SerializationError {
                message: format!("unknown aggregate_type '{other}' in stored event"),
            })
        }
    };
    let payload_str: String = row.get("payload");
    let payload: serde_json::Value =
        serde_json::from_str(&payload_str).map_err(|e| EventStoreError::SerializationError {
            message: e.to_string(),
        })?;
    let consensus_id: Option<String> = row.get("consensus_id");

    Ok(Event {
        id: EventId::from_string(row.get("id")),
        aggregate_type,
        aggregate_id: row.get("aggregate_id"),
        event_type: row.get("event_type"),
        timestamp: row.get::<DateTime<Utc>, _>("timestamp"),
        payload,
        consensus_id: consensus_id.map(ConsensusId::from_string),
    })
}

impl EventStore for SqliteEventStore {
    #[instrument(skip(self, events), fields(aggregate_id = %aggregate_id, event_count = events.len()))]
    async fn append(&self, aggregate_id: &str, events: Vec<Event>) -> Result<(), EventStoreError> {
        if events.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(|e| {
            error!(error = %e, "failed to begin transaction");
            EventStoreError::ConnectionError {
                message: e.to_string(),
            }
        })?;

        let current_seq: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(stream_seq), 0) FROM events WHERE aggregate_id = ?1",
        )
        .bind(aggregate_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| EventStoreError::ConnectionError {
            message: e.to_string(),
        })?;

        let mut next_seq = current_seq;
        for event in &events {
            next_seq += 1;
            let payload_str = serde_json::to_string(&event.payload).map_err(|e| {
                EventStoreError::SerializationError {
                    message: e.to_string(),
                }
            })?;
            sqlx::query(
                r#"
                INSERT INTO events (id, aggregate_type, aggregate_id, event_type, payload, timestamp, consensus_id, stream_seq)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(event.id.as_str())
            .bind(event.aggregate_type_str())
            .bind(aggregate_id)
            .bind(&event.event_type)
            .bind(payload_str)
            .bind(event.timestamp)
            .bind(event.consensus_id.as_ref().map(|c| c.as_str()))
            .bind(next_seq)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                error!(error = %e, event_id = %event.id.as_str(), "failed to insert event");
                EventStoreError::ConnectionError {
                    message: e.to_string(),
                }
            })?;
        }

        tx.commit().await.map_err(|e| {
            error!(error = %e, "failed to commit transaction");
            EventStoreError::ConnectionError {
                message: e.to_string(),
            }
        })?;

        debug!(next_seq, "events appended");
        Ok(())
    }

    #[instrument(skip(self), fields(aggregate_id = %aggregate_id))]
    async fn replay(&self, aggregate_id: &str) -> Result<Vec<Event>, EventStoreError> {
        let rows = sqlx::query(
            "SELECT * FROM events WHERE aggregate_id = ?1 ORDER BY stream_seq ASC",
        )
        .bind(aggregate_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| EventStoreError::ConnectionError {
            message: e.to_string(),
        })?;

        rows.iter().map(row_to_event).collect()
    }
}

impl EventExport for SqliteEventStore {
    async fn query_events(
        &self,
        aggregate_type: Option<&str>,
        aggregate_id: Option<&str>,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Event>, EventStoreError> {
        let mut query = String::from("SELECT * FROM events WHERE 1 = 1");
        if aggregate_type.is_some() {
            query.push_str(" AND aggregate_type = ?");
        }
        if aggregate_id.is_some() {
            query.push_str(" AND aggregate_id = ?");
        }
        if since.is_some() {
            query.push_str(" AND timestamp >= ?");
        }
        query.push_str(" ORDER BY timestamp ASC");

        let mut q = sqlx::query(&query);
        if let Some(v) = aggregate_type {
            q = q.bind(v);
        }
        if let Some(v) = aggregate_id {
            q = q.bind(v);
        }
        if let Some(v) = since {
            q = q.bind(v);
        }

        let rows = q.fetch_all(&self.pool).await.map_err(|e| EventStoreError::ConnectionError {
            message: e.to_string(),
        })?;
        rows.iter().map(row_to_event).collect()
    }
}
