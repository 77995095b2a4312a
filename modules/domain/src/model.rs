use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pricing tier an LLM endpoint belongs to. Informational only — pool
/// partitioning (§4.2) is driven by `is_free`/`enabled`, not this field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    High,
    Mid,
    Base,
}

/// Immutable configuration for one model endpoint, loaded at startup from a
/// static table plus environment toggles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub id: String,
    pub name: String,
    pub provider: String,
    /// 1-100.
    pub base_weight: u32,
    pub context_window: u32,
    pub tier: ModelTier,
    pub capabilities: HashSet<String>,
    pub supports_tools: bool,
    pub is_free: bool,
    pub timeout_ms: u64,
    pub enabled: bool,
}

/// Mutable, per-model running totals. Mirrored to KV (`model.perf.{id}`,
/// 24h TTL) after every update so replicas converge eventually.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelPerformance {
    pub success: u64,
    pub failure: u64,
    pub tool_success: u64,
    pub tool_failure: u64,
    pub total_latency_ms: u64,
    pub last_used: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
}

impl ModelPerformance {
    pub fn record_success(&mut self, latency_ms: u64, at: DateTime<Utc>) {
        self.success += 1;
        self.total_latency_ms += latency_ms;
        self.consecutive_failures = 0;
        self.last_used = Some(at);
    }

    pub fn record_failure(&mut self, at: DateTime<Utc>) {
        self.failure += 1;
        self.consecutive_failures += 1;
        self.last_used = Some(at);
    }

    pub fn record_tool_success(&mut self) {
        self.tool_success += 1;
    }

    pub fn record_tool_failure(&mut self) {
        self.tool_failure += 1;
    }

    pub fn average_latency_ms(&self) -> f64 {
        if self.success == 0 {
            0.0
        } else {
            self.total_latency_ms as f64 / self.success as f64
        }
    }

    pub fn success_rate(&self) -> Option<f64> {
        let total = self.success + self.failure;
        if total == 0 {
            None
        } else {
            Some(self.success as f64 / total as f64)
        }
    }
}

/// Per-model circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Circuit breaker bookkeeping: current state, when it opened (meaningful
/// only while open/half-open), and a sliding window of recent error
/// timestamps used by the error-rate trip condition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerState {
    #[serde(default)]
    pub state: Option<CircuitState>,
    pub opened_at: Option<DateTime<Utc>>,
    pub error_timestamps: VecDeque<DateTime<Utc>>,
}

impl CircuitBreakerState {
    pub fn state(&self) -> CircuitState {
        self.state.unwrap_or(CircuitState::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_rate_is_none_with_no_requests() {
        let perf = ModelPerformance::default();
        assert_eq!(perf.success_rate(), None);
    }

    #[test]
    fn record_success_resets_consecutive_failures() {
        let mut perf = ModelPerformance::default();
        perf.record_failure(Utc::now());
        perf.record_failure(Utc::now());
        assert_eq!(perf.consecutive_failures, 2);
        perf.record_success(100, Utc::now());
        assert_eq!(perf.consecutive_failures, 0);
        assert_eq!(perf.success, 1);
    }

    #[test]
    fn average_latency_divides_by_successes_only() {
        let mut perf = ModelPerformance::default();
        perf.record_success(100, Utc::now());
        perf.record_success(300, Utc::now());
        assert_eq!(perf.average_latency_ms(), 200.0);
    }

    #[test]
    fn circuit_defaults_to_closed() {
        let cb = CircuitBreakerState::default();
        assert_eq!(cb.state(), CircuitState::Closed);
    }
}
