use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::anomaly::ProductSnapshot;

/// The validator's classification of a confirmed glitch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlitchType {
    DecimalError,
    DatabaseError,
    Clearance,
    CouponStack,
    Unknown,
}

/// A validated pricing error worth broadcasting. Exists iff the originating
/// [`crate::PricingAnomaly`] had `is_glitch=true` and `confidence >= 50`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedGlitch {
    pub id: String,
    pub anomaly_id: String,
    pub product: ProductSnapshot,
    pub is_glitch: bool,
    /// 0-100.
    pub confidence: u8,
    pub reasoning: String,
    pub glitch_type: GlitchType,
    /// Percentage, clamped to `>= 0`.
    pub profit_margin: f64,
    pub validated_at: DateTime<Utc>,
}

impl ValidatedGlitch {
    /// `(original_price - current_price) / original_price * 100`, clamped to
    /// `>= 0`, when the original price is known; falls back to the
    /// anomaly's reported discount percentage otherwise.
    pub fn compute_profit_margin(original_price: Option<f64>, current_price: f64, discount_percentage: Option<f64>) -> f64 {
        match original_price {
            Some(original) if original > 0.0 => {
                ((original - current_price) / original * 100.0).max(0.0)
            }
            _ => discount_percentage.unwrap_or(0.0).max(0.0),
        }
    }
}
