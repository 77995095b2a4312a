use std::time::Duration;

use chrono::{DateTime, Utc};
use domain::{CircuitBreakerState, CircuitState};

/// Consecutive-failure trip threshold (§4.2: "when `consecutive_failures`
/// reaches 5"). Not configurable via environment — only the sliding-window
/// signal is (`CIRCUIT_BREAKER_THRESHOLD`/`CIRCUIT_BREAKER_WINDOW_MS`).
pub const CONSECUTIVE_FAILURE_THRESHOLD: u32 = 5;

/// The window-based trip signal and the open→half-open cooldown, both
/// sourced from §6's `CIRCUIT_BREAKER_THRESHOLD`/`CIRCUIT_BREAKER_WINDOW_MS`.
#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    pub window_threshold: u32,
    pub window: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            window_threshold: 3,
            window: Duration::from_millis(300_000),
        }
    }
}

/// Drop error timestamps that have aged out of the sliding window.
fn prune_window(state: &mut CircuitBreakerState, window: Duration, now: DateTime<Utc>) {
    let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::zero());
    while let Some(&oldest) = state.error_timestamps.front() {
        if now - oldest > window {
            state.error_timestamps.pop_front();
        } else {
            break;
        }
    }
}

/// Promote `Open -> HalfOpen` once `cfg.window` has elapsed since
/// `opened_at` (§4.2 "Open -> Half-open"). Call this before reading a
/// circuit's state for selection purposes — the transition is lazy.
pub fn tick(state: &mut CircuitBreakerState, cfg: &CircuitBreakerConfig, now: DateTime<Utc>) {
    if state.state() == CircuitState::Open {
        if let Some(opened_at) = state.opened_at {
            let elapsed = now - opened_at;
            let window = chrono::Duration::from_std(cfg.window).unwrap_or(chrono::Duration::zero());
            if elapsed >= window {
                state.state = Some(CircuitState::HalfOpen);
            }
        }
    }
}

/// Record a failure's effect on the breaker: push the error timestamp,
/// prune the window, and evaluate the closed->open / half_open->open
/// transitions. `consecutive_failures` is read from the caller's
/// already-updated [`domain::ModelPerformance`].
pub fn record_failure(
    state: &mut CircuitBreakerState,
    consecutive_failures: u32,
    cfg: &CircuitBreakerConfig,
    now: DateTime<Utc>,
) {
    state.error_timestamps.push_back(now);
    prune_window(state, cfg.window, now);

    match state.state() {
        CircuitState::Closed => {
            let window_tripped = state.error_timestamps.len() as u32 >= cfg.window_threshold;
            if consecutive_failures >= CONSECUTIVE_FAILURE_THRESHOLD || window_tripped {
                state.state = Some(CircuitState::Open);
                state.opened_at = Some(now);
            }
        }
        CircuitState::HalfOpen => {
            state.state = Some(CircuitState::Open);
            state.opened_at = Some(now);
        }
        CircuitState::Open => {}
    }
}

/// `Half-open -> Closed` on success (§4.2). A success while closed is a
/// no-op beyond clearing the error window, since the circuit is already
/// closed.
pub fn record_success(state: &mut CircuitBreakerState) {
    state.state = Some(CircuitState::Closed);
    state.opened_at = None;
    state.error_timestamps.clear();
}

/// Force a circuit straight to half-open, bypassing the cooldown — used
/// by selection's "reset oldest circuit" fallback when every model in a
/// pool is open (§4.2 step 2).
pub fn force_half_open(state: &mut CircuitBreakerState) {
    state.state = Some(CircuitState::HalfOpen);
}

pub fn is_open(state: &CircuitBreakerState) -> bool {
    state.state() == CircuitState::Open
}

pub fn is_selectable(state: &CircuitBreakerState) -> bool {
    matches!(state.state(), CircuitState::Closed | CircuitState::HalfOpen)
}
