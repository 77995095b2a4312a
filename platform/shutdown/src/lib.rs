//! # Shutdown
//!
//! A SIGTERM/SIGINT-driven coordinator: traps the signal, flips a
//! process-wide flag every polling loop observes, runs registered cleanup
//! callbacks serially against a total time budget, and force-exits
//! non-zero if that budget is blown (§5).
//!
//! Grounded on the signal-trapping shape of a `ShutdownCoordinator` found
//! elsewhere in the retrieved pack, extended here with ordered cleanup
//! callbacks, in-flight tracking, and the timeout/force-exit behavior the
//! pipeline's worker binaries need.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::sync::{watch, Mutex};
use tracing::{error, info, warn};

type CleanupFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
type CleanupFn = Box<dyn FnOnce() -> CleanupFuture + Send>;

struct Cleanup {
    name: String,
    run: CleanupFn,
}

/// Coordinates graceful shutdown across a worker process.
///
/// Clone and share this freely — every clone observes the same shutdown
/// flag and in-flight counter.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    tx: watch::Sender<bool>,
    inflight: Arc<AtomicUsize>,
    cleanups: Arc<Mutex<Vec<Cleanup>>>,
    budget: Duration,
}

/// RAII guard tracking one in-flight handler invocation.
///
/// The stream consumer framework and the notify dispatcher hold one of
/// these for the duration of a single entry's processing, so shutdown can
/// let the current entry finish before the loop checks the flag again.
pub struct InFlightGuard {
    inflight: Arc<AtomicUsize>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.inflight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ShutdownCoordinator {
    /// Build a coordinator with a total cleanup budget (§6
    /// `GRACEFUL_SHUTDOWN_TIMEOUT`, default 30s).
    pub fn new(budget: Duration) -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            tx,
            inflight: Arc::new(AtomicUsize::new(0)),
            cleanups: Arc::new(Mutex::new(Vec::new())),
            budget,
        }
    }

    /// A receiver that observes `true` once shutdown has been triggered.
    /// Every polling loop (stream consumers, delay queue consumers) holds
    /// one of these and checks it before starting the next unit of work.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Whether shutdown has been triggered.
    pub fn is_shutting_down(&self) -> bool {
        *self.tx.borrow()
    }

    /// Register a cleanup callback, run serially in registration order
    /// once shutdown begins. Typical cleanups: flush metrics, close
    /// connection pools, drain an in-flight batch.
    pub async fn register_cleanup<F, Fut>(&self, name: impl Into<String>, f: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut cleanups = self.cleanups.lock().await;
        cleanups.push(Cleanup {
            name: name.into(),
            run: Box::new(move || Box::pin(f())),
        });
    }

    /// Mark the start of a handler invocation; the returned guard releases
    /// it on drop.
    pub fn track_inflight(&self) -> InFlightGuard {
        self.inflight.fetch_add(1, Ordering::SeqCst);
        InFlightGuard {
            inflight: self.inflight.clone(),
        }
    }

    /// Block until SIGTERM or SIGINT arrives, then run the full shutdown
    /// sequence: flip the flag, run cleanups within the budget, and
    /// `std::process::exit(1)` if the budget is exceeded.
    ///
    /// Call this from `main` as the last thing before joining worker
    /// tasks; it never returns except after a clean shutdown.
    pub async fn run_until_signal(&self) {
        wait_for_signal().await;
        self.shutdown().await;
    }

    /// Trigger shutdown directly, bypassing signal handling — useful for
    /// tests and for other failure paths that should shut the process
    /// down in the same orderly way.
    pub async fn shutdown(&self) {
        if *self.tx.borrow() {
            return;
        }
        info!("graceful shutdown initiated");
        let _ = self.tx.send(true);

        let cleanups = std::mem::take(&mut *self.cleanups.lock().await);
        let result = tokio::time::timeout(self.budget, run_cleanups_serially(cleanups)).await;

        match result {
            Ok(()) => info!("graceful shutdown completed within budget"),
            Err(_) => {
                error!(
                    budget_ms = self.budget.as_millis() as u64,
                    "shutdown cleanup exceeded budget, forcing exit"
                );
                std::process::exit(1);
            }
        }
    }
}

async fn run_cleanups_serially(cleanups: Vec<Cleanup>) {
    for cleanup in cleanups {
        info!(name = %cleanup.name, "running shutdown cleanup");
        (cleanup.run)().await;
    }
}

async fn wait_for_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT"),
        _ = terminate => info!("received SIGTERM"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[tokio::test]
    async fn shutdown_flips_flag_and_notifies_subscribers() {
        let coordinator = ShutdownCoordinator::new(Duration::from_secs(1));
        let mut rx = coordinator.subscribe();
        assert!(!*rx.borrow());

        coordinator.shutdown().await;
        rx.changed().await.unwrap();
        assert!(*rx.borrow());
        assert!(coordinator.is_shutting_down());
    }

    #[tokio::test]
    async fn cleanups_run_in_registration_order() {
        let coordinator = ShutdownCoordinator::new(Duration::from_secs(1));
        let order = Arc::new(Mutex::new(Vec::new()));

        let order_a = order.clone();
        coordinator
            .register_cleanup("a", move || async move {
                order_a.lock().await.push("a");
            })
            .await;

        let order_b = order.clone();
        coordinator
            .register_cleanup("b", move || async move {
                order_b.lock().await.push("b");
            })
            .await;

        coordinator.shutdown().await;
        assert_eq!(*order.lock().await, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let coordinator = ShutdownCoordinator::new(Duration::from_secs(1));
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = ran.clone();
        coordinator
            .register_cleanup("once", move || async move {
                ran_clone.store(true, Ordering::SeqCst);
            })
            .await;

        coordinator.shutdown().await;
        coordinator.shutdown().await;
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn inflight_guard_decrements_on_drop() {
        let coordinator = ShutdownCoordinator::new(Duration::from_secs(1));
        {
            let _guard = coordinator.track_inflight();
            assert_eq!(coordinator.inflight.load(Ordering::SeqCst), 1);
        }
        assert_eq!(coordinator.inflight.load(Ordering::SeqCst), 0);
    }
}
