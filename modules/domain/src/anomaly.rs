use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A retailer's reported stock level at detection time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    InStock,
    LowStock,
    OutOfStock,
    Unknown,
}

/// The detector heuristic that flagged a price as anomalous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    ZScore,
    PercentageDrop,
    DecimalError,
    Historical,
}

/// An anomaly's position in the pending → validated|rejected → notified
/// lifecycle. Transitions are monotonic: see [`PricingAnomaly::can_transition_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyStatus {
    Pending,
    Validated,
    Rejected,
    Notified,
}

impl AnomalyStatus {
    /// Whether moving from `self` to `next` is a legal forward transition.
    /// `Notified` is idempotent — re-marking an already-notified anomaly is
    /// allowed and is a no-op at the caller.
    pub fn can_transition_to(self, next: AnomalyStatus) -> bool {
        use AnomalyStatus::*;
        matches!(
            (self, next),
            (Pending, Validated)
                | (Pending, Rejected)
                | (Validated, Notified)
                | (Notified, Notified)
        )
    }
}

/// The product snapshot captured at detection time. Stored by value on both
/// [`PricingAnomaly`] and [`crate::ValidatedGlitch`] — downstream consumers
/// never re-resolve it against the retailer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub title: String,
    pub current_price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_price: Option<f64>,
    pub stock_status: StockStatus,
    pub retailer_id: String,
    pub url: String,
    pub category: String,
}

/// A statistically flagged candidate price, pre-validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingAnomaly {
    pub id: String,
    pub product: ProductSnapshot,
    pub anomaly_type: AnomalyType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_percentage: Option<f64>,
    /// Detector-assigned confidence, 0-100.
    pub initial_confidence: u8,
    pub detected_at: DateTime<Utc>,
    pub status: AnomalyStatus,
}

impl PricingAnomaly {
    /// Move to `next` if the transition is legal, returning whether the
    /// status actually changed (`false` for the `Notified -> Notified`
    /// no-op so callers can skip redundant side effects).
    pub fn transition(&mut self, next: AnomalyStatus) -> Result<bool, InvalidTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        let changed = self.status != next;
        self.status = next;
        Ok(changed)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("cannot transition anomaly status from {from:?} to {to:?}")]
pub struct InvalidTransition {
    pub from: AnomalyStatus,
    pub to: AnomalyStatus,
}
