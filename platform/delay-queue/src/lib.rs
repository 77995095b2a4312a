//! # Delay Queue
//!
//! A delayed-delivery job queue: enqueue a payload to become visible after
//! `delay_ms`, optionally deduped on a caller-supplied `unique_id`. The
//! tiered notification dispatcher (§4.4) uses one queue per tier so that a
//! `low`-tier job sits for longer before a worker ever sees it.
//!
//! Unlike the teacher's retry queue (SQLite via `sqlx`, built for durable
//! webhook redelivery with exponential backoff baked in), this queue has no
//! opinion on retries — callers schedule a single future delivery. Retries,
//! where needed, go through [`stream_bus`]'s DLQ helpers instead.

mod inmemory;
mod job;
mod redis_queue;

pub use inmemory::InMemoryDelayQueue;
pub use job::DelayedJob;
pub use redis_queue::RedisDelayQueue;

use async_trait::async_trait;
use std::sync::Arc;

/// Errors that can occur when using the delay queue.
#[derive(Debug, thiserror::Error)]
pub enum DelayQueueError {
    #[error("failed to enqueue job: {0}")]
    Enqueue(String),

    #[error("failed to poll queue: {0}")]
    Poll(String),

    #[error("connection error: {0}")]
    ConnectionError(String),
}

pub type DelayResult<T> = Result<T, DelayQueueError>;

/// Implemented by callers that want to process jobs popped off a queue.
///
/// A plain `async fn(Vec<u8>) -> Result<(), String>` would do, but a trait
/// lets `consume` take an `Arc<dyn DelayQueueHandler>` and clone it cheaply
/// across worker tasks, mirroring how the stream consumer framework passes
/// handlers around.
#[async_trait]
pub trait DelayQueueHandler: Send + Sync {
    async fn handle(&self, payload: Vec<u8>) -> Result<(), String>;
}

#[async_trait]
impl<F, Fut> DelayQueueHandler for F
where
    F: Fn(Vec<u8>) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<(), String>> + Send,
{
    async fn handle(&self, payload: Vec<u8>) -> Result<(), String> {
        (self)(payload).await
    }
}

/// A delayed-delivery, optionally-deduped job queue.
#[async_trait]
pub trait DelayQueue: Send + Sync {
    /// Schedule `payload` to become available on `queue` after `delay_ms`.
    ///
    /// If `unique_id` is `Some` and a still-pending job with that id already
    /// exists on `queue`, the add is a no-op and `Ok(None)` is returned.
    /// Otherwise returns the id assigned to the new job.
    async fn add(
        &self,
        queue: &str,
        payload: Vec<u8>,
        delay_ms: u64,
        unique_id: Option<&str>,
    ) -> DelayResult<Option<String>>;

    /// Run forever, popping due jobs off `queue` and dispatching them to
    /// `handler` with up to `concurrency` jobs in flight at once.
    ///
    /// Returns only when `shutdown` resolves, which callers drive from the
    /// [`shutdown`] coordinator so every worker drains in step.
    async fn consume(
        &self,
        queue: &str,
        concurrency: usize,
        handler: Arc<dyn DelayQueueHandler>,
        shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> DelayResult<()>;
}
