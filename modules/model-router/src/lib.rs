//! # Model Router
//!
//! Performance-aware selection over a pool of LLM model endpoints for the
//! AI validator (§4.2). Tracks per-model success/failure counts and a
//! sliding-window circuit breaker, mirrors both to KV so a fresh process
//! converges instantly on restart, and exposes a unicorn-escalation path
//! that widens the candidate pool to paid/premium models for exceptional
//! anomalies.

mod circuit;
mod config;
mod pool;
mod router;
mod selection;
mod unicorn;
mod weight;

pub use circuit::{CircuitBreakerConfig, CONSECUTIVE_FAILURE_THRESHOLD};
pub use config::{apply_env_toggles, default_table, load_pool};
pub use pool::{sota_pool, standard_pool, tool_capable};
pub use router::{circuit_window_from_millis, ModelRouter, ModelStats, RouterConfig};
pub use selection::select_from_pool;
pub use unicorn::{is_unicorn, UnicornContext};
pub use weight::effective_weight;
