/// Inputs the dispatcher wrapper uses to decide whether a validation
/// request is exceptional enough to warrant the SOTA pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnicornContext {
    pub discount_percentage: Option<f64>,
    pub confidence: Option<u8>,
    pub z_score: Option<f64>,
}

/// A request is a unicorn iff at least two of the three signals clear
/// their threshold (§4.2 "Unicorn escalation").
pub fn is_unicorn(ctx: &UnicornContext) -> bool {
    let mut hits = 0;
    if ctx.discount_percentage.map(|d| d >= 80.0).unwrap_or(false) {
        hits += 1;
    }
    if ctx.confidence.map(|c| c >= 85).unwrap_or(false) {
        hits += 1;
    }
    if ctx.z_score.map(|z| z >= 4.0).unwrap_or(false) {
        hits += 1;
    }
    hits >= 2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_signals_is_not_unicorn() {
        assert!(!is_unicorn(&UnicornContext::default()));
    }

    #[test]
    fn single_signal_is_not_enough() {
        let ctx = UnicornContext {
            discount_percentage: Some(95.0),
            ..Default::default()
        };
        assert!(!is_unicorn(&ctx));
    }

    #[test]
    fn discount_and_confidence_together_are_a_unicorn() {
        let ctx = UnicornContext {
            discount_percentage: Some(80.0),
            confidence: Some(85),
            z_score: None,
        };
        assert!(is_unicorn(&ctx));
    }

    #[test]
    fn confidence_and_z_score_together_are_a_unicorn() {
        let ctx = UnicornContext {
            discount_percentage: None,
            confidence: Some(90),
            z_score: Some(4.2),
        };
        assert!(is_unicorn(&ctx));
    }

    #[test]
    fn thresholds_are_inclusive() {
        let ctx = UnicornContext {
            discount_percentage: Some(80.0),
            confidence: None,
            z_score: Some(4.0),
        };
        assert!(is_unicorn(&ctx));
    }

    #[test]
    fn just_under_threshold_does_not_count() {
        let ctx = UnicornContext {
            discount_percentage: Some(79.9),
            confidence: Some(84),
            z_score: Some(3.9),
        };
        assert!(!is_unicorn(&ctx));
    }
}
