use domain::ModelPerformance;

/// A model's base weight adjusted by its runtime performance (§4.2
/// "Effective weight"). Never returns less than 1 — a model with a bad
/// streak should become rare in the draw, not unselectable (that's what
/// the circuit breaker is for).
pub fn effective_weight(base_weight: u32, perf: &ModelPerformance) -> u32 {
    let Some(success_rate) = perf.success_rate() else {
        return base_weight;
    };

    let consecutive_penalty = (perf.consecutive_failures * 10).min(80) as i64;

    let tool_bonus = if perf.tool_success + perf.tool_failure > 0 {
        let tool_rate = perf.tool_success as f64 / (perf.tool_success + perf.tool_failure) as f64;
        (tool_rate * 5.0).round() as i64
    } else {
        0
    };

    let scaled = (base_weight as f64 * success_rate).round() as i64;
    (scaled - consecutive_penalty + tool_bonus).max(1) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_history_returns_base_weight() {
        let perf = ModelPerformance::default();
        assert_eq!(effective_weight(50, &perf), 50);
    }

    #[test]
    fn perfect_record_keeps_full_weight() {
        let mut perf = ModelPerformance::default();
        for _ in 0..10 {
            perf.record_success(100, chrono::Utc::now());
        }
        assert_eq!(effective_weight(50, &perf), 50);
    }

    #[test]
    fn consecutive_failures_are_penalized_and_capped_at_80() {
        let mut perf = ModelPerformance::default();
        perf.record_success(100, chrono::Utc::now());
        for _ in 0..20 {
            perf.record_failure(chrono::Utc::now());
        }
        // success_rate = 1/21 ~ 0.0476, scaled base ~ 50*0.0476 ~ 2,
        // penalty capped at 80 -> floor of 1.
        assert_eq!(effective_weight(50, &perf), 1);
    }

    #[test]
    fn tool_bonus_rewards_tool_reliability() {
        let mut perf = ModelPerformance::default();
        perf.record_success(100, chrono::Utc::now());
        perf.record_tool_success();
        perf.record_tool_success();
        assert_eq!(effective_weight(50, &perf), 50 + 5);
    }

    #[test]
    fn weight_never_drops_below_one() {
        let mut perf = ModelPerformance::default();
        perf.record_failure(chrono::Utc::now());
        for _ in 0..10 {
            perf.record_failure(chrono::Utc::now());
        }
        assert!(effective_weight(1, &perf) >= 1);
    }
}
