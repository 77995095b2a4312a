//! # Stream Bus
//!
//! A platform-level abstraction for the durable, cursor-addressable event
//! stream that backs the pricing-anomaly pipeline.
//!
//! ## Why This Lives in `platform/`
//!
//! The Stream Bus is a **shared runtime capability**: both the AI validator
//! worker and the notification dispatcher worker consume from it, and
//! neither owns it. Placing it in `platform/` keeps the two workers free of
//! any dependency on each other and lets the backing store be swapped
//! (Redis Streams in production, in-memory for dev/test) without touching
//! consumer code.
//!
//! ## Implementations
//!
//! - [`RedisStreamBus`]: production implementation backed by Redis Streams
//!   (`XADD`/`XRANGE`/`XLEN`), which natively gives us the "strictly after
//!   a given id, in insertion order" semantics the consumer framework
//!   needs.
//! - [`InMemoryStreamBus`]: test/dev implementation using an in-process
//!   append-only log, for unit tests and local development without a
//!   Redis server.

mod dlq;
mod entry_id;
mod inmemory;
mod redis_bus;

pub use dlq::DlqEntry;
pub use entry_id::EntryId;
pub use inmemory::InMemoryStreamBus;
pub use redis_bus::RedisStreamBus;

use async_trait::async_trait;

/// A single entry read back from a stream.
#[derive(Debug, Clone)]
pub struct StreamEntry {
    /// The monotonically increasing id assigned by the bus on append.
    pub id: EntryId,
    /// The raw payload bytes, as appended.
    pub payload: Vec<u8>,
}

/// Errors that can occur when using the stream bus.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("failed to append to stream: {0}")]
    AppendError(String),

    #[error("failed to read from stream: {0}")]
    ReadError(String),

    #[error("connection error: {0}")]
    ConnectionError(String),

    #[error("invalid entry id: {0}")]
    InvalidEntryId(String),
}

/// Result type for stream bus operations.
pub type BusResult<T> = Result<T, BusError>;

/// Core stream abstraction: a durable, append-only, cursor-addressable log.
///
/// This is deliberately narrower than a general pub/sub bus — every
/// implementation must support resuming a read strictly after a given
/// entry id, because the Stream Consumer Framework's at-least-once
/// delivery depends on that property.
#[async_trait]
pub trait StreamBus: Send + Sync {
    /// Append `payload` to `stream`, returning the id assigned to it.
    ///
    /// Ids are monotonically increasing within a stream and take the form
    /// `{ms}-{seq}`.
    async fn xadd(&self, stream: &str, payload: Vec<u8>) -> BusResult<EntryId>;

    /// Read up to `count` entries strictly after `after`, in insertion
    /// order. Pass [`EntryId::ZERO`] to read from the beginning.
    async fn xread(
        &self,
        stream: &str,
        after: &EntryId,
        count: usize,
    ) -> BusResult<Vec<StreamEntry>>;

    /// Return the total number of entries ever appended to `stream`.
    ///
    /// Used only for metrics and admin inspection (§2, component J) — no
    /// consumer logic depends on this value.
    async fn xlen(&self, stream: &str) -> BusResult<u64>;
}

/// The dead-letter stream name for a given origin stream.
pub fn dlq_stream_name(origin_stream: &str) -> String {
    format!("dlq.{origin_stream}")
}

/// Append a [`DlqEntry`] describing a handler failure to `dlq.{stream}`.
pub async fn route_to_dlq(
    bus: &dyn StreamBus,
    stream: &str,
    entry_id: &EntryId,
    payload: &[u8],
    error: &str,
) -> BusResult<EntryId> {
    let entry = DlqEntry {
        stream: stream.to_string(),
        entry_id: entry_id.to_string(),
        payload: String::from_utf8_lossy(payload).to_string(),
        error: error.to_string(),
        ts: chrono::Utc::now(),
    };
    let body = serde_json::to_vec(&entry).map_err(|e| BusError::AppendError(e.to_string()))?;
    bus.xadd(&dlq_stream_name(stream), body).await
}

/// Peek at up to `count` entries in `dlq.{stream}`, oldest first, without
/// consuming them — used by the admin/inspection surface (§2, component J).
pub async fn peek_dlq(
    bus: &dyn StreamBus,
    stream: &str,
    count: usize,
) -> BusResult<Vec<StreamEntry>> {
    bus.xread(&dlq_stream_name(stream), &EntryId::ZERO, count)
        .await
}
