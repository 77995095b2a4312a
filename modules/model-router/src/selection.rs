use std::collections::HashMap;

use chrono::{DateTime, Utc};
use domain::{CircuitBreakerState, ModelConfig, ModelPerformance};
use rand::Rng;

use crate::circuit::{self, CircuitBreakerConfig};
use crate::weight::effective_weight;

/// §4.2 "Selection": pick one model from `pool`, given the current
/// performance and circuit state for each candidate.
///
/// Mutates `circuits` in two cases: lazily promoting a due `Open ->
/// HalfOpen` transition (step-0 housekeeping the spec treats as
/// happening "as of now"), and the forced half-open reset in step 2 when
/// every circuit in the pool is open.
pub fn select_from_pool(
    pool: &[&ModelConfig],
    performances: &HashMap<String, ModelPerformance>,
    circuits: &mut HashMap<String, CircuitBreakerState>,
    cfg: &CircuitBreakerConfig,
    now: DateTime<Utc>,
    rng: &mut impl Rng,
) -> Option<ModelConfig> {
    if pool.is_empty() {
        return None;
    }

    for model in pool {
        let circuit = circuits.entry(model.id.clone()).or_default();
        circuit::tick(circuit, cfg, now);
    }

    let selectable: Vec<&ModelConfig> = pool
        .iter()
        .copied()
        .filter(|m| {
            circuits
                .get(&m.id)
                .map(circuit::is_selectable)
                .unwrap_or(true)
        })
        .collect();

    if selectable.is_empty() {
        return reset_oldest_or_fallback(pool, circuits);
    }

    weighted_pick(&selectable, performances, rng)
}

/// §4.2 step 2: every circuit in the pool is open. Reset whichever opened
/// earliest to half-open and return it; if no circuit has an
/// `opened_at` on record at all, fall back to the pool's first model.
fn reset_oldest_or_fallback(
    pool: &[&ModelConfig],
    circuits: &mut HashMap<String, CircuitBreakerState>,
) -> Option<ModelConfig> {
    let oldest_id = pool
        .iter()
        .filter_map(|m| {
            circuits
                .get(&m.id)
                .and_then(|c| c.opened_at)
                .map(|opened_at| (opened_at, m.id.clone()))
        })
        .min_by_key(|(opened_at, _)| *opened_at)
        .map(|(_, id)| id);

    match oldest_id {
        Some(id) => {
            let circuit = circuits.entry(id.clone()).or_default();
            circuit::force_half_open(circuit);
            pool.iter().find(|m| m.id == id).map(|m| (*m).clone())
        }
        None => pool.first().map(|m| (*m).clone()),
    }
}

/// §4.2 step 3-4: weighted draw over `selectable` in stable (input) order.
fn weighted_pick(
    selectable: &[&ModelConfig],
    performances: &HashMap<String, ModelPerformance>,
    rng: &mut impl Rng,
) -> Option<ModelConfig> {
    let weights: Vec<u32> = selectable
        .iter()
        .map(|m| {
            let perf = performances.get(&m.id).cloned().unwrap_or_default();
            effective_weight(m.base_weight, &perf)
        })
        .collect();
    let total: u32 = weights.iter().sum();

    if total == 0 {
        return selectable.first().map(|m| (*m).clone());
    }

    let r = rng.gen_range(0..total);
    let mut cumulative = 0u32;
    for (model, weight) in selectable.iter().zip(weights.iter()) {
        cumulative += weight;
        if cumulative > r {
            return Some((*model).clone());
        }
    }
    selectable.last().map(|m| (*m).clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{CircuitState, ModelTier};
    use rand::thread_rng;
    use std::collections::HashSet;

    fn model(id: &str, base_weight: u32) -> ModelConfig {
        ModelConfig {
            id: id.into(),
            name: id.into(),
            provider: "p".into(),
            base_weight,
            context_window: 1000,
            tier: ModelTier::Base,
            capabilities: HashSet::new(),
            supports_tools: false,
            is_free: true,
            timeout_ms: 1000,
            enabled: true,
        }
    }

    #[test]
    fn empty_pool_selects_nothing() {
        let mut circuits = HashMap::new();
        let got = select_from_pool(
            &[],
            &HashMap::new(),
            &mut circuits,
            &CircuitBreakerConfig::default(),
            Utc::now(),
            &mut thread_rng(),
        );
        assert!(got.is_none());
    }

    #[test]
    fn open_circuit_excludes_model_from_selection() {
        let a = model("a", 50);
        let b = model("b", 50);
        let pool = vec![&a, &b];

        let mut circuits = HashMap::new();
        let mut open = CircuitBreakerState::default();
        open.state = Some(CircuitState::Open);
        open.opened_at = Some(Utc::now());
        circuits.insert("a".to_string(), open);

        for _ in 0..20 {
            let picked = select_from_pool(
                &pool,
                &HashMap::new(),
                &mut circuits,
                &CircuitBreakerConfig::default(),
                Utc::now(),
                &mut thread_rng(),
            )
            .unwrap();
            assert_eq!(picked.id, "b");
        }
    }

    #[test]
    fn all_open_resets_oldest_to_half_open() {
        let a = model("a", 50);
        let b = model("b", 50);
        let pool = vec![&a, &b];

        let mut circuits = HashMap::new();
        let now = Utc::now();
        let mut open_a = CircuitBreakerState::default();
        open_a.state = Some(CircuitState::Open);
        open_a.opened_at = Some(now - chrono::Duration::seconds(10));
        circuits.insert("a".to_string(), open_a);

        let mut open_b = CircuitBreakerState::default();
        open_b.state = Some(CircuitState::Open);
        open_b.opened_at = Some(now);
        circuits.insert("b".to_string(), open_b);

        // Neither circuit has had its cooldown elapse (default window is
        // 5 minutes), so selectable is empty and we exercise step 2.
        let picked = select_from_pool(
            &pool,
            &HashMap::new(),
            &mut circuits,
            &CircuitBreakerConfig::default(),
            now,
            &mut thread_rng(),
        )
        .unwrap();

        assert_eq!(picked.id, "a");
        assert_eq!(circuits["a"].state(), CircuitState::HalfOpen);
    }

    #[test]
    fn weight_proportionality_converges_over_many_draws() {
        let a = model("a", 75);
        let b = model("b", 25);
        let pool = vec![&a, &b];
        let mut circuits = HashMap::new();
        let mut rng = thread_rng();

        let mut counts = HashMap::new();
        for _ in 0..10_000 {
            let picked = select_from_pool(
                &pool,
                &HashMap::new(),
                &mut circuits,
                &CircuitBreakerConfig::default(),
                Utc::now(),
                &mut rng,
            )
            .unwrap();
            *counts.entry(picked.id).or_insert(0u32) += 1;
        }

        let a_share = *counts.get("a").unwrap_or(&0) as f64 / 10_000.0;
        assert!((a_share - 0.75).abs() < 0.05, "a_share was {a_share}");
    }
}
