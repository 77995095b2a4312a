use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use domain::{CircuitBreakerState, CircuitState, ModelConfig, ModelPerformance};
use kv_store::Kv;
use rand::thread_rng;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::circuit::{self, CircuitBreakerConfig};
use crate::pool;
use crate::selection::select_from_pool;
use crate::unicorn::{is_unicorn, UnicornContext};

/// Mirrors §4.2's distributed-state TTL: 24h, matching §3's "Performance
/// records and circuit states are ephemeral, persisted with TTL (24h)".
const STATE_TTL_SECONDS: u64 = 24 * 60 * 60;

/// Router-wide tunables sourced from §6's env var table.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub enable_sota_models: bool,
    pub circuit: CircuitBreakerConfig,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            enable_sota_models: false,
            circuit: CircuitBreakerConfig::default(),
        }
    }
}

/// Point-in-time stats for one model, for the admin/inspection surface
/// (§4.2 "Stats exposure").
#[derive(Debug, Clone)]
pub struct ModelStats {
    pub model_id: String,
    pub effective_weight: u32,
    pub performance: ModelPerformance,
    pub circuit_state: CircuitState,
    pub last_used: Option<chrono::DateTime<Utc>>,
    pub average_latency_ms: f64,
}

/// The distributed, performance-aware selection engine over a pool of
/// model endpoints (§4.2). Holds the immutable startup pool plus mutable
/// per-model performance and circuit maps, each behind its own lock so
/// concurrent `record_success`/`record_failure` calls from independent
/// validator tasks never serialize against each other's model.
pub struct ModelRouter {
    models: Vec<ModelConfig>,
    performances: Mutex<HashMap<String, ModelPerformance>>,
    circuits: Mutex<HashMap<String, CircuitBreakerState>>,
    kv: Arc<dyn Kv>,
    cfg: RouterConfig,
}

impl ModelRouter {
    /// Build a router over `models`, restoring any performance/circuit
    /// state mirrored to KV from a previous process (cold-start
    /// convergence, §3 "Lifecycles"). Missing or corrupt KV entries are
    /// treated as "no history" rather than an error.
    pub async fn new(models: Vec<ModelConfig>, kv: Arc<dyn Kv>, cfg: RouterConfig) -> Self {
        let mut performances = HashMap::new();
        let mut circuits = HashMap::new();

        for model in &models {
            if let Some(perf) = load_state::<ModelPerformance>(&*kv, &perf_key(&model.id)).await {
                performances.insert(model.id.clone(), perf);
            }
            if let Some(circuit) =
                load_state::<CircuitBreakerState>(&*kv, &circuit_key(&model.id)).await
            {
                circuits.insert(model.id.clone(), circuit);
            }
        }

        Self {
            models,
            performances: Mutex::new(performances),
            circuits: Mutex::new(circuits),
            kv,
            cfg,
        }
    }

    /// Select a model for a plain (non-unicorn-aware) request from the
    /// standard pool.
    pub async fn select(&self) -> Option<ModelConfig> {
        let pool = pool::standard_pool(&self.models);
        self.select_from(&pool).await
    }

    /// Select a model restricted to tool-capable endpoints.
    pub async fn select_tool_capable(&self) -> Option<ModelConfig> {
        let standard = pool::standard_pool(&self.models);
        let tool_pool = pool::tool_capable(&standard);
        self.select_from(&tool_pool).await
    }

    /// The unicorn-escalation wrapper (§4.2 "Unicorn escalation"): routes
    /// to the SOTA pool when the request qualifies and SOTA is enabled,
    /// falling back to the standard pool if the chosen pool has no
    /// models configured at all.
    pub async fn select_for_validation(&self, ctx: &UnicornContext) -> Option<ModelConfig> {
        let use_sota = self.cfg.enable_sota_models && is_unicorn(ctx);
        let candidate_pool = if use_sota {
            pool::sota_pool(&self.models)
        } else {
            pool::standard_pool(&self.models)
        };

        if candidate_pool.is_empty() {
            debug!(use_sota, "chosen pool has no models, falling back to standard pool");
            let standard = pool::standard_pool(&self.models);
            return self.select_from(&standard).await;
        }

        self.select_from(&candidate_pool).await
    }

    /// Excludes `already_tried` model ids, for the AI validator's
    /// "up to 3 attempts across distinct models" retry loop (§4.3 step 6).
    pub async fn select_for_validation_excluding(
        &self,
        ctx: &UnicornContext,
        already_tried: &[String],
    ) -> Option<ModelConfig> {
        let use_sota = self.cfg.enable_sota_models && is_unicorn(ctx);
        let mut candidate_pool = if use_sota {
            pool::sota_pool(&self.models)
        } else {
            pool::standard_pool(&self.models)
        };
        candidate_pool.retain(|m| !already_tried.iter().any(|id| id == &m.id));

        if candidate_pool.is_empty() {
            let mut standard = pool::standard_pool(&self.models);
            standard.retain(|m| !already_tried.iter().any(|id| id == &m.id));
            return self.select_from(&standard).await;
        }

        self.select_from(&candidate_pool).await
    }

    async fn select_from(&self, pool: &[&ModelConfig]) -> Option<ModelConfig> {
        let performances = self.performances.lock().await;
        let mut circuits = self.circuits.lock().await;
        let picked = select_from_pool(
            pool,
            &performances,
            &mut circuits,
            &self.cfg.circuit,
            Utc::now(),
            &mut thread_rng(),
        );
        drop(performances);

        if let Some(model) = &picked {
            if let Some(circuit) = circuits.get(&model.id) {
                persist_state(&*self.kv, &circuit_key(&model.id), circuit).await;
            }
        }
        picked
    }

    /// §4.2 "record_success": reset the failure streak, close the
    /// circuit, and persist both.
    pub async fn record_success(&self, model_id: &str, latency_ms: u64) {
        let now = Utc::now();
        let mut performances = self.performances.lock().await;
        let perf = performances.entry(model_id.to_string()).or_default();
        perf.record_success(latency_ms, now);
        let perf_snapshot = perf.clone();
        drop(performances);

        let mut circuits = self.circuits.lock().await;
        let circuit = circuits.entry(model_id.to_string()).or_default();
        circuit::record_success(circuit);
        let circuit_snapshot = circuit.clone();
        drop(circuits);

        persist_state(&*self.kv, &perf_key(model_id), &perf_snapshot).await;
        persist_state(&*self.kv, &circuit_key(model_id), &circuit_snapshot).await;
    }

    /// §4.2 "record_failure": bump counters, push the error timestamp,
    /// evaluate the breaker, and persist both.
    pub async fn record_failure(&self, model_id: &str) {
        let now = Utc::now();
        let mut performances = self.performances.lock().await;
        let perf = performances.entry(model_id.to_string()).or_default();
        perf.record_failure(now);
        let consecutive_failures = perf.consecutive_failures;
        let perf_snapshot = perf.clone();
        drop(performances);

        let mut circuits = self.circuits.lock().await;
        let circuit = circuits.entry(model_id.to_string()).or_default();
        let was_open = circuit::is_open(circuit);
        circuit::record_failure(circuit, consecutive_failures, &self.cfg.circuit, now);
        let is_open_now = circuit::is_open(circuit);
        let circuit_snapshot = circuit.clone();
        drop(circuits);

        if !was_open && is_open_now {
            warn!(model_id, "circuit breaker tripped open");
        }

        persist_state(&*self.kv, &perf_key(model_id), &perf_snapshot).await;
        persist_state(&*self.kv, &circuit_key(model_id), &circuit_snapshot).await;
    }

    pub async fn record_tool_success(&self, model_id: &str) {
        let mut performances = self.performances.lock().await;
        let perf = performances.entry(model_id.to_string()).or_default();
        perf.record_tool_success();
        let snapshot = perf.clone();
        drop(performances);
        persist_state(&*self.kv, &perf_key(model_id), &snapshot).await;
    }

    pub async fn record_tool_failure(&self, model_id: &str) {
        let mut performances = self.performances.lock().await;
        let perf = performances.entry(model_id.to_string()).or_default();
        perf.record_tool_failure();
        let snapshot = perf.clone();
        drop(performances);
        persist_state(&*self.kv, &perf_key(model_id), &snapshot).await;
    }

    /// Snapshot stats for every model in the pool (§4.2 "Stats exposure").
    pub async fn stats(&self) -> Vec<ModelStats> {
        let performances = self.performances.lock().await;
        let circuits = self.circuits.lock().await;
        self.models
            .iter()
            .map(|m| {
                let perf = performances.get(&m.id).cloned().unwrap_or_default();
                let circuit = circuits.get(&m.id).cloned().unwrap_or_default();
                ModelStats {
                    model_id: m.id.clone(),
                    effective_weight: crate::weight::effective_weight(m.base_weight, &perf),
                    average_latency_ms: perf.average_latency_ms(),
                    last_used: perf.last_used,
                    performance: perf,
                    circuit_state: circuit.state(),
                }
            })
            .collect()
    }

    pub fn models(&self) -> &[ModelConfig] {
        &self.models
    }
}

fn perf_key(model_id: &str) -> String {
    format!("model.perf.{model_id}")
}

fn circuit_key(model_id: &str) -> String {
    format!("model.circuit.{model_id}")
}

async fn load_state<T: serde::de::DeserializeOwned>(kv: &dyn Kv, key: &str) -> Option<T> {
    match kv.get(key).await {
        Ok(Some(raw)) => serde_json::from_str(&raw).ok(),
        _ => None,
    }
}

async fn persist_state<T: serde::Serialize>(kv: &dyn Kv, key: &str, value: &T) {
    if let Ok(json) = serde_json::to_string(value) {
        if let Err(err) = kv.set(key, &json, Some(STATE_TTL_SECONDS)).await {
            warn!(key, error = %err, "failed to mirror router state to kv");
        }
    }
}

/// Convenience re-export so callers don't need `Duration` just to build a
/// default [`RouterConfig`] with a custom circuit window.
pub fn circuit_window_from_millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kv_store::InMemoryKv;

    fn test_model(id: &str, is_free: bool) -> ModelConfig {
        ModelConfig {
            id: id.into(),
            name: id.into(),
            provider: "p".into(),
            base_weight: 50,
            context_window: 1000,
            tier: domain::ModelTier::Base,
            capabilities: Default::default(),
            supports_tools: false,
            is_free,
            timeout_ms: 1000,
            enabled: true,
        }
    }

    #[tokio::test]
    async fn record_failure_enough_times_opens_circuit_and_excludes_from_selection() {
        let models = vec![test_model("a", true), test_model("b", true)];
        let kv: Arc<dyn Kv> = Arc::new(InMemoryKv::default());
        let router = ModelRouter::new(models, kv, RouterConfig::default()).await;

        for _ in 0..5 {
            router.record_failure("a").await;
        }

        for _ in 0..20 {
            let picked = router.select().await.unwrap();
            assert_eq!(picked.id, "b");
        }
    }

    #[tokio::test]
    async fn record_success_closes_a_half_open_circuit() {
        let models = vec![test_model("a", true)];
        let kv: Arc<dyn Kv> = Arc::new(InMemoryKv::default());
        let router = ModelRouter::new(models, kv, RouterConfig::default()).await;

        for _ in 0..5 {
            router.record_failure("a").await;
        }
        {
            let mut circuits = router.circuits.lock().await;
            circuit::force_half_open(circuits.get_mut("a").unwrap());
        }
        router.record_success("a", 100).await;

        let stats = router.stats().await;
        let a = stats.iter().find(|s| s.model_id == "a").unwrap();
        assert_eq!(a.circuit_state, CircuitState::Closed);
    }

    #[tokio::test]
    async fn state_survives_a_cold_start_via_kv() {
        let models = vec![test_model("a", true)];
        let kv: Arc<dyn Kv> = Arc::new(InMemoryKv::default());

        {
            let router = ModelRouter::new(models.clone(), kv.clone(), RouterConfig::default()).await;
            for _ in 0..5 {
                router.record_failure("a").await;
            }
        }

        let router = ModelRouter::new(models, kv, RouterConfig::default()).await;
        let stats = router.stats().await;
        let a = stats.iter().find(|s| s.model_id == "a").unwrap();
        assert_eq!(a.circuit_state, CircuitState::Open);
        assert_eq!(a.performance.consecutive_failures, 5);
    }

    #[tokio::test]
    async fn unicorn_context_routes_to_sota_pool_when_enabled() {
        let models = vec![test_model("std", true), test_model("sota", false)];
        let kv: Arc<dyn Kv> = Arc::new(InMemoryKv::default());
        let cfg = RouterConfig {
            enable_sota_models: true,
            circuit: CircuitBreakerConfig::default(),
        };
        let router = ModelRouter::new(models, kv, cfg).await;

        let ctx = UnicornContext {
            discount_percentage: Some(90.0),
            confidence: Some(90),
            z_score: None,
        };
        for _ in 0..20 {
            let picked = router.select_for_validation(&ctx).await.unwrap();
            assert_eq!(picked.id, "sota");
        }
    }

    #[tokio::test]
    async fn non_unicorn_context_uses_standard_pool() {
        let models = vec![test_model("std", true), test_model("sota", false)];
        let kv: Arc<dyn Kv> = Arc::new(InMemoryKv::default());
        let cfg = RouterConfig {
            enable_sota_models: true,
            circuit: CircuitBreakerConfig::default(),
        };
        let router = ModelRouter::new(models, kv, cfg).await;

        let ctx = UnicornContext::default();
        for _ in 0..20 {
            let picked = router.select_for_validation(&ctx).await.unwrap();
            assert_eq!(picked.id, "std");
        }
    }
}
