//! # Stream Consumer Framework
//!
//! Drives a handler against a named [`StreamBus`] stream with at-least-once
//! delivery: loads a cursor from [`Kv`], reads a batch strictly after it,
//! invokes the handler entry-by-entry in order, and only advances the
//! cursor once an entry either succeeds or is routed to the dead-letter
//! stream. §4.1 is the authority for the exact algorithm; this crate is a
//! direct transcription of it, generalized over any `Handler`.
//!
//! Grounded on the teacher's `modules/gl/src/consumer/gl_posting_consumer.rs`
//! shape (subscribe, process entry-by-entry, retry, DLQ on exhaustion) and
//! `modules/gl/src/dlq.rs`'s "write full context, never silently drop"
//! discipline — generalized here from NATS subject subscription to a
//! cursor-addressable stream because §4.1 requires resumable "strictly
//! after" reads that a fire-and-forget subscription can't give replay of.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kv_store::Kv;
use shutdown::ShutdownCoordinator;
use stream_bus::{route_to_dlq, EntryId, StreamBus, StreamEntry};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// §7's error-kind table, reified so the framework can dispatch on kind
/// instead of string-matching a handler's error message.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProcessingError {
    /// HTTP 5xx, timeouts, network resets — retried in place.
    #[error("transient error: {0}")]
    Transient(String),

    /// HTTP 429 — retried in place, same as transient, but callers may
    /// inspect the variant to drive backoff policy upstream.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Unparseable payload. The caller should NOT return this from
    /// `handle` for a failure it wants retried — malformed entries are
    /// meant to be caught by [`run`] before dispatch when possible, or
    /// treated as advance-and-warn by the handler itself.
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// Exhausted retries / consistent logical failure — same disposition
    /// as a transient error at this layer (both retry then DLQ); kept
    /// distinct so handlers can report precisely.
    #[error("handler logical error: {0}")]
    Logical(String),
}

/// Implemented by whatever drives one stream: the AI validator for
/// `anomaly.detected`, the notification dispatcher for `anomaly.confirmed`.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, entry: &StreamEntry) -> Result<(), ProcessingError>;
}

/// Tunables for [`run`] (§4.1 "Config"). Defaults match §6's env var table.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub batch_size: usize,
    pub poll_interval: Duration,
    pub max_retries: u32,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            poll_interval: Duration::from_millis(2000),
            max_retries: 5,
        }
    }
}

fn cursor_key(stream: &str) -> String {
    format!("cursor.stream.{stream}")
}

/// Consume `stream` under consumer `group`, driving `handler` until
/// `shutdown` fires. Returns once the current batch has drained past the
/// shutdown flag being observed — never on its own otherwise.
///
/// `group` only namespaces the cursor key today (one KV key per
/// stream+group pair); a future multi-replica design that needs per-group
/// fan-out would extend this, but §4.1 describes a single logical cursor
/// per stream and that's what's implemented.
pub async fn run(
    bus: Arc<dyn StreamBus>,
    kv: Arc<dyn Kv>,
    stream: &str,
    group: &str,
    handler: Arc<dyn Handler>,
    cfg: ConsumerConfig,
    shutdown: ShutdownCoordinator,
) {
    let cursor_key = cursor_key(&format!("{group}.{stream}"));
    let mut shutdown_rx = shutdown.subscribe();
    let failures: Mutex<HashMap<EntryId, u32>> = Mutex::new(HashMap::new());

    info!(stream, group, "stream consumer starting");

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let cursor = load_cursor(&*kv, &cursor_key).await;

        let entries = match bus.xread(stream, &cursor, cfg.batch_size).await {
            Ok(entries) => entries,
            Err(err) => {
                warn!(stream, error = %err, "stream read failed, will retry next poll");
                Vec::new()
            }
        };

        if entries.is_empty() {
            if sleep_or_shutdown(cfg.poll_interval, &mut shutdown_rx).await {
                break;
            }
            continue;
        }

        let mut shutdown_mid_batch = false;
        for entry in &entries {
            if *shutdown_rx.borrow() {
                debug!(stream, entry_id = %entry.id, "shutdown requested, abandoning in-flight batch");
                shutdown_mid_batch = true;
                break;
            }

            let _guard = shutdown.track_inflight();
            match handler.handle(entry).await {
                Ok(()) => {
                    failures.lock().await.remove(&entry.id);
                    set_cursor(&*kv, &cursor_key, &entry.id).await;
                }
                Err(ProcessingError::Malformed(reason)) => {
                    // §4.1/§7: malformed payloads advance immediately with
                    // a warning — they are never DLQ'd, since there's no
                    // well-formed entry to retry.
                    warn!(stream, entry_id = %entry.id, error = %reason, "malformed payload, advancing cursor");
                    failures.lock().await.remove(&entry.id);
                    set_cursor(&*kv, &cursor_key, &entry.id).await;
                }
                Err(err) => {
                    let mut failure_counts = failures.lock().await;
                    let count = failure_counts.entry(entry.id).or_insert(0);
                    *count += 1;
                    let count = *count;
                    drop(failure_counts);

                    // §4.1's algorithm text DLQs once `count >= max_retries`,
                    // i.e. on the `max_retries`-th attempt — with the
                    // default of 5 that's the 5th attempt, one sooner than
                    // the "fails 5 times, advances on the 6th iteration"
                    // wording of the worked example in §8 scenario 4. The
                    // algorithm text is the normative spec; this follows it
                    // rather than the scenario's off-by-one.
                    if count < cfg.max_retries {
                        debug!(
                            stream,
                            entry_id = %entry.id,
                            attempt = count,
                            max_retries = cfg.max_retries,
                            error = %err,
                            "handler failed, will retry same entry next iteration"
                        );
                        break;
                    }

                    warn!(
                        stream,
                        entry_id = %entry.id,
                        attempts = count,
                        error = %err,
                        "handler exhausted retries, routing to DLQ"
                    );
                    if let Err(dlq_err) =
                        route_to_dlq(&*bus, stream, &entry.id, &entry.payload, &err.to_string()).await
                    {
                        warn!(stream, entry_id = %entry.id, error = %dlq_err, "failed to write DLQ entry");
                    }
                    failures.lock().await.remove(&entry.id);
                    set_cursor(&*kv, &cursor_key, &entry.id).await;
                }
            }
        }

        if shutdown_mid_batch {
            break;
        }

        if sleep_or_shutdown(cfg.poll_interval, &mut shutdown_rx).await {
            break;
        }
    }

    info!(stream, group, "stream consumer stopped");
}

async fn load_cursor(kv: &dyn Kv, cursor_key: &str) -> EntryId {
    match kv.get(cursor_key).await {
        Ok(Some(raw)) => EntryId::parse(&raw).unwrap_or(EntryId::ZERO),
        Ok(None) => EntryId::ZERO,
        Err(err) => {
            warn!(cursor_key, error = %err, "failed to load cursor, defaulting to zero");
            EntryId::ZERO
        }
    }
}

async fn set_cursor(kv: &dyn Kv, cursor_key: &str, id: &EntryId) {
    // Cursors are permanent keys (§13 Open Question Resolution) — no TTL.
    if let Err(err) = kv.set(cursor_key, &id.to_string(), None).await {
        warn!(cursor_key, error = %err, "failed to persist cursor");
    }
}

/// Sleep for `interval`, waking early on shutdown. Returns `true` if
/// shutdown fired while sleeping.
async fn sleep_or_shutdown(
    interval: Duration,
    shutdown_rx: &mut tokio::sync::watch::Receiver<bool>,
) -> bool {
    if *shutdown_rx.borrow() {
        return true;
    }
    tokio::select! {
        _ = tokio::time::sleep(interval) => false,
        result = shutdown_rx.changed() => result.is_ok() && *shutdown_rx.borrow(),
    }
}
