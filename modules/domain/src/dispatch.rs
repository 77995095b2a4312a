use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tier::Tier;

/// One scheduled per-tier-group delivery for a confirmed glitch. The
/// Delay Queue dedups on [`DispatchJob::unique_id`], so the same
/// `(glitch_id, tiers)` pair is never enqueued twice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchJob {
    pub glitch_id: String,
    pub target_tiers: Vec<Tier>,
    pub scheduled_at: DateTime<Utc>,
}

impl DispatchJob {
    pub fn new(glitch_id: impl Into<String>, target_tiers: Vec<Tier>, scheduled_at: DateTime<Utc>) -> Self {
        Self {
            glitch_id: glitch_id.into(),
            target_tiers,
            scheduled_at,
        }
    }

    /// `notify-{glitch_id}-{joined-tiers}`, stable regardless of the input
    /// tier ordering so the same tier group always produces the same key.
    pub fn unique_id(&self) -> String {
        let mut tiers: Vec<&'static str> = self.target_tiers.iter().map(|t| t.as_str()).collect();
        tiers.sort_unstable();
        format!("notify-{}-{}", self.glitch_id, tiers.join(","))
    }
}
