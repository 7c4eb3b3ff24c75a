//! SeedLoop port traits
//!
//! This crate defines the interfaces adapters must implement so the core
//! never depends directly on a database client, an LLM SDK, or a process
//! spawner. Per spec §6, the external interfaces are:
//! - EventStore (+ its Unit-of-Work)
//! - LlmClient
//! - ToolRunner
//! - EventExport
//! - Clock

use std::future::Future;

use chrono::{DateTime, Utc};
use seedloop_domain::Event;

pub mod unit_of_work;
pub use unit_of_work::{CheckpointSink, UnitOfWork};

/// Event store port per spec §4.1.
///
/// The append-only event log is the sole source of truth for the state the
/// evolutionary loop reconstructs on every step.
pub trait EventStore: Send + Sync {
    /// Appends events to a stream, atomically. Never blocks on reads.
    fn append(
        &self,
        aggregate_id: &str,
        events: Vec<Event>,
    ) -> impl Future<Output = Result<(), EventStoreError>> + Send;

    /// Replays all events for one aggregate, in append order.
    fn replay(&self, aggregate_id: &str) -> impl Future<Output = Result<Vec<Event>, EventStoreError>> + Send;

    /// Opens a Unit-of-Work scoped to one aggregate (spec §4.1): events
    /// staged against it are invisible to readers until `commit` flushes
    /// them and writes a checkpoint; `abort` (or simply dropping it)
    /// discards the buffer instead. No other component writes directly.
    fn transaction<'a>(&'a self, aggregate_id: &'a str) -> UnitOfWork<'a, Self>
    where
        Self: Sized,
    {
        UnitOfWork::new(self, aggregate_id)
    }
}

/// Event store errors.
#[derive(Debug, thiserror::Error)]
pub enum EventStoreError {
    #[error("concurrency conflict on aggregate {aggregate_id}")]
    ConcurrencyConflict { aggregate_id: String },

    #[error("stream not found: {aggregate_id}")]
    StreamNotFound { aggregate_id: String },

    #[error("connection error: {message}")]
    ConnectionError { message: String },

    #[error("serialization error: {message}")]
    SerializationError { message: String },
}

/// Event export port per spec §6: consumed by an external dashboard, never
/// by the core itself.
pub trait EventExport: Send + Sync {
    fn query_events(
        &self,
        aggregate_type: Option<&str>,
        aggregate_id: Option<&str>,
        since: Option<DateTime<Utc>>,
    ) -> impl Future<Output = Result<Vec<Event>, EventStoreError>> + Send;
}

/// One role-tagged message in an LLM completion request.
#[derive(Debug, Clone)]
pub struct LlmMessage {
    pub role: LlmRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone)]
pub struct LlmParams {
    pub temperature: f32,
    pub max_tokens: u32,
    pub response_format: LlmResponseFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmResponseFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct LlmCompletion {
    pub content: String,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// LLM collaborator interface per spec §6, consumed by the Evaluator,
/// Executor, Compressor, and Lateral Engine. Retry is the adapter's concern;
/// the core only ever sees a completion or a `ProviderError`.
pub trait LlmClient: Send + Sync {
    fn complete(
        &self,
        messages: Vec<LlmMessage>,
        model: &str,
        params: LlmParams,
    ) -> impl Future<Output = Result<LlmCompletion, ProviderError>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("provider unavailable: {message}")]
    Unavailable { message: String },

    #[error("provider timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("provider returned a malformed response: {message}")]
    MalformedResponse { message: String },
}

#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Tooling interface per spec §6, consumed by Stage 1 of the evaluation
/// pipeline. Absence of a tool is a typed variant, not a silent skip.
pub trait ToolRunner: Send + Sync {
    fn run(&self, command: &str) -> impl Future<Output = Result<ToolOutput, ToolError>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("tool missing: {tool} (install with `{install_hint}`)")]
    ToolMissing { tool: String, install_hint: String },

    #[error("tool execution failed: {message}")]
    ExecutionFailed { message: String },
}

/// Clock port for deterministic time handling in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
