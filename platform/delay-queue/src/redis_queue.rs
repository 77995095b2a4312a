//! Redis implementation of [`DelayQueue`], backed by a sorted set per queue
//! name (score = due-at epoch milliseconds) plus a companion set used to
//! dedup on `unique_id`.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{DelayQueue, DelayQueueError, DelayQueueHandler, DelayResult, DelayedJob};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

fn zset_key(queue: &str) -> String {
    format!("delayq.{queue}.due")
}

fn dedup_key(queue: &str) -> String {
    format!("delayq.{queue}.unique")
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// `DelayQueue` implementation backed by Redis sorted sets.
#[derive(Clone)]
pub struct RedisDelayQueue {
    conn: ConnectionManager,
}

impl RedisDelayQueue {
    pub async fn connect(client: redis::Client) -> DelayResult<Self> {
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| DelayQueueError::ConnectionError(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Pop up to `count` jobs whose due time has passed, removing them from
    /// the sorted set atomically so that no two workers dequeue the same
    /// job. Redis's `ZPOPMIN` is not range-bounded, so this fetches the
    /// single lowest-score member, checks it's actually due, and pops only
    /// then — cheap since jobs are processed in due-time order anyway.
    async fn pop_due(&self, queue: &str, max: usize) -> DelayResult<Vec<DelayedJob>> {
        let mut conn = self.conn.clone();
        let key = zset_key(queue);
        let mut out = Vec::new();

        for _ in 0..max {
            let popped: Vec<(String, f64)> = conn
                .zpopmin(&key, 1)
                .await
                .map_err(|e| DelayQueueError::Poll(e.to_string()))?;
            let Some((raw, score)) = popped.into_iter().next() else {
                break;
            };
            if score as u64 > now_ms() {
                // Not due yet — put it back and stop scanning.
                let _: () = conn
                    .zadd(&key, &raw, score)
                    .await
                    .map_err(|e| DelayQueueError::Poll(e.to_string()))?;
                break;
            }
            match serde_json::from_str::<DelayedJob>(&raw) {
                Ok(job) => out.push(job),
                Err(err) => warn!(queue, error = %err, "dropping unparseable delay queue entry"),
            }
        }

        Ok(out)
    }
}

#[async_trait]
impl DelayQueue for RedisDelayQueue {
    async fn add(
        &self,
        queue: &str,
        payload: Vec<u8>,
        delay_ms: u64,
        unique_id: Option<&str>,
    ) -> DelayResult<Option<String>> {
        let mut conn = self.conn.clone();

        if let Some(uid) = unique_id {
            let key = dedup_key(queue);
            let added: bool = conn
                .sadd(&key, uid)
                .await
                .map_err(|e| DelayQueueError::Enqueue(e.to_string()))?;
            if !added {
                return Ok(None);
            }
            // Dedup sets otherwise grow unbounded; a day's headroom covers
            // the longest tier delay (§4.4) with room to spare.
            let _: Result<(), _> = conn.expire(&key, 86_400).await;
        }

        let id = Uuid::new_v4().to_string();
        let job = DelayedJob {
            id: id.clone(),
            payload,
            unique_id: unique_id.map(str::to_string),
        };
        let serialized =
            serde_json::to_string(&job).map_err(|e| DelayQueueError::Enqueue(e.to_string()))?;
        let due_at = now_ms() + delay_ms;

        conn.zadd::<_, _, _, ()>(zset_key(queue), serialized, due_at as f64)
            .await
            .map_err(|e| DelayQueueError::Enqueue(e.to_string()))?;

        Ok(Some(id))
    }

    async fn consume(
        &self,
        queue: &str,
        concurrency: usize,
        handler: Arc<dyn DelayQueueHandler>,
        mut shutdown: watch::Receiver<bool>,
    ) -> DelayResult<()> {
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut interval = tokio::time::interval(POLL_INTERVAL);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        debug!(queue, "delay queue consumer received shutdown signal");
                        return Ok(());
                    }
                }
                _ = interval.tick() => {
                    let due = self.pop_due(queue, concurrency * 4).await?;
                    for job in due {
                        let permit = semaphore
                            .clone()
                            .acquire_owned()
                            .await
                            .expect("semaphore closed");
                        let handler = handler.clone();
                        let dedup_key = job
                            .unique_id
                            .as_ref()
                            .map(|_| dedup_key(queue));
                        let unique_id = job.unique_id.clone();
                        let mut release_conn = self.conn.clone();
                        tokio::spawn(async move {
                            let _permit = permit;
                            let job_id = job.id.clone();
                            if let Err(err) = handler.handle(job.payload).await {
                                warn!(job_id = %job_id, error = %err, "delay queue job handler failed");
                            }
                            if let (Some(key), Some(uid)) = (dedup_key, unique_id) {
                                let _: Result<(), _> = release_conn.srem(&key, uid).await;
                            }
                        });
                    }
                }
            }
        }
    }
}
