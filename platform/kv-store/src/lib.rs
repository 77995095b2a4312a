//! # KV Store
//!
//! The TTL'd key-value adapter used throughout the pricing-anomaly pipeline
//! for dedup markers, cursors, counters and router state mirroring. It lives
//! in `platform/` for the same reason the stream bus does: it's a shared
//! runtime capability with no single owning module, and every caller needs
//! to be free to swap Redis for an in-memory store in tests.
//!
//! Keys in active use (see each module for the exact format):
//! `cursor.stream.{name}`, `model.perf.{id}`, `model.circuit.{id}`,
//! `notify.glitch.{id}`, `notify.user.{uid}.glitch.{gid}`,
//! `{channel}.limit.{uid}.{yyyy-mm-dd}`, `metrics.{name}`.

mod inmemory;
mod redis_kv;

pub use inmemory::InMemoryKv;
pub use redis_kv::RedisKv;

use async_trait::async_trait;

/// Errors that can occur when using the KV store.
#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("kv get failed: {0}")]
    Get(String),

    #[error("kv set failed: {0}")]
    Set(String),

    #[error("kv incr failed: {0}")]
    Incr(String),

    #[error("kv del failed: {0}")]
    Del(String),

    #[error("kv keys failed: {0}")]
    Keys(String),

    #[error("connection error: {0}")]
    ConnectionError(String),
}

pub type KvResult<T> = Result<T, KvError>;

/// A TTL'd key-value store.
///
/// `set`/`set_nx` take an optional TTL in seconds; `None` means no
/// expiration. Last-writer-wins — there is no optimistic concurrency here,
/// which the spec calls out explicitly as acceptable (router selection is
/// randomized anyway, and dedup only needs first-writer-wins via `set_nx`).
#[async_trait]
pub trait Kv: Send + Sync {
    /// Fetch a value, or `None` if the key does not exist or has expired.
    async fn get(&self, key: &str) -> KvResult<Option<String>>;

    /// Unconditionally set `key` to `value`, with an optional TTL in seconds.
    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> KvResult<()>;

    /// Set `key` to `value` only if it does not already exist (or has
    /// expired). Returns `true` if the set happened. This is the primitive
    /// dedup relies on — a bare `get`-then-`set` would race.
    async fn set_nx(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> KvResult<bool>;

    /// Atomically increment a counter, creating it at 0 first if absent,
    /// and return the new value.
    async fn incr(&self, key: &str) -> KvResult<i64>;

    /// Whether `key` currently exists (and has not expired).
    async fn exists(&self, key: &str) -> KvResult<bool>;

    /// Remove `key`. A no-op if it does not exist.
    async fn del(&self, key: &str) -> KvResult<()>;

    /// List keys matching a glob-style `pattern`. Admin/inspection use only
    /// (§2, component J) — no pipeline logic depends on this.
    async fn keys(&self, pattern: &str) -> KvResult<Vec<String>>;
}
