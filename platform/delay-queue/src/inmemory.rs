//! In-memory implementation of [`DelayQueue`] for testing and development.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{DelayQueue, DelayQueueHandler, DelayResult, DelayedJob};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

struct Pending {
    due_at: Instant,
    job: DelayedJob,
}

#[derive(Default)]
struct QueueState {
    pending: Vec<Pending>,
    unique_ids: HashSet<String>,
}

/// `DelayQueue` implementation backed by an in-process scheduled list.
/// Suitable for unit tests and local development without a Redis server.
#[derive(Default, Clone)]
pub struct InMemoryDelayQueue {
    queues: Arc<Mutex<HashMap<String, QueueState>>>,
}

impl InMemoryDelayQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn pop_due(&self, queue: &str) -> Vec<DelayedJob> {
        let mut queues = self.queues.lock().expect("delay-queue lock poisoned");
        let Some(state) = queues.get_mut(queue) else {
            return Vec::new();
        };
        let now = Instant::now();
        let mut due = Vec::new();
        state.pending.retain(|p| {
            if p.due_at <= now {
                due.push(p.job.clone());
                false
            } else {
                true
            }
        });
        due
    }

    fn release_unique_id(&self, queue: &str, unique_id: &str) {
        let mut queues = self.queues.lock().expect("delay-queue lock poisoned");
        if let Some(state) = queues.get_mut(queue) {
            state.unique_ids.remove(unique_id);
        }
    }

    /// Number of jobs currently waiting (not yet due) on `queue`. Test-only
    /// introspection; production code drives the queue through `consume`.
    pub fn pending_count(&self, queue: &str) -> usize {
        let queues = self.queues.lock().expect("delay-queue lock poisoned");
        queues.get(queue).map(|s| s.pending.len()).unwrap_or(0)
    }
}

#[async_trait]
impl DelayQueue for InMemoryDelayQueue {
    async fn add(
        &self,
        queue: &str,
        payload: Vec<u8>,
        delay_ms: u64,
        unique_id: Option<&str>,
    ) -> DelayResult<Option<String>> {
        let mut queues = self.queues.lock().expect("delay-queue lock poisoned");
        let state = queues.entry(queue.to_string()).or_default();

        if let Some(uid) = unique_id {
            if state.unique_ids.contains(uid) {
                return Ok(None);
            }
            state.unique_ids.insert(uid.to_string());
        }

        let id = Uuid::new_v4().to_string();
        state.pending.push(Pending {
            due_at: Instant::now() + Duration::from_millis(delay_ms),
            job: DelayedJob {
                id: id.clone(),
                payload,
                unique_id: unique_id.map(str::to_string),
            },
        });
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
                    for job in self.pop_due(queue) {
                        let permit = semaphore.clone().acquire_owned().await.expect("semaphore closed");
                        let handler = handler.clone();
                        let this = self.clone();
                        let queue_name = queue.to_string();
                        tokio::spawn(async move {
                            let _permit = permit;
                            if let Err(err) = handler.handle(job.payload.clone()).await {
                                warn!(job_id = %job.id, error = %err, "delay queue job handler failed");
                            }
                            if let Some(uid) = &job.unique_id {
                                this.release_unique_id(&queue_name, uid);
                            }
                        });
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn add_returns_job_id() {
        let queue = InMemoryDelayQueue::new();
        let id = queue.add("q", b"payload".to_vec(), 0, None).await.unwrap();
        assert!(id.is_some());
    }

    #[tokio::test]
    async fn add_with_duplicate_unique_id_is_noop() {
        let queue = InMemoryDelayQueue::new();
        let first = queue.add("q", b"a".to_vec(), 1000, Some("uid-1")).await.unwrap();
        let second = queue.add("q", b"b".to_vec(), 1000, Some("uid-1")).await.unwrap();
        assert!(first.is_some());
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn consume_invokes_handler_once_delay_elapses() {
        let queue = Arc::new(InMemoryDelayQueue::new());
        queue.add("q", b"hello".to_vec(), 10, None).await.unwrap();

        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        let handler: Arc<dyn DelayQueueHandler> = Arc::new(move |payload: Vec<u8>| {
            let seen = seen_clone.clone();
            async move {
                assert_eq!(payload, b"hello");
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        let (tx, rx) = watch::channel(false);
        let queue_clone = queue.clone();
        let consumer = tokio::spawn(async move {
            queue_clone.consume("q", 4, handler, rx).await
        });

        tokio::time::sleep(Duration::from_millis(150)).await;
        tx.send(true).unwrap();
        consumer.await.unwrap().unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
