//! # Domain
//!
//! The pricing-glitch data model shared by every worker: the anomaly a
//! detector reports, the glitch a validator confirms, the model pool a
//! router selects from, and the dispatch jobs a notifier schedules.
//!
//! This crate holds data only — no Bus/KV/HTTP access. Everything here is
//! `Serialize`/`Deserialize` because every value crosses a stream-bus
//! boundary at least once (§3's snapshots are stored by value at emission
//! time; downstream consumers never re-resolve them).

mod anomaly;
mod dispatch;
mod glitch;
mod model;
mod tier;

pub use anomaly::{AnomalyStatus, AnomalyType, PricingAnomaly, ProductSnapshot, StockStatus};
pub use dispatch::DispatchJob;
pub use glitch::{GlitchType, ValidatedGlitch};
pub use model::{CircuitBreakerState, CircuitState, ModelConfig, ModelPerformance, ModelTier};
pub use tier::Tier;
