use std::sync::Arc;

use async_trait::async_trait;
use channel_providers::{Channel, ChannelRegistry};
use chrono::Utc;
use delay_queue::DelayQueue;
use domain::{DispatchJob, Tier, ValidatedGlitch};
use kv_store::Kv;
use stream_consumer::{Handler, ProcessingError};
use tracing::{info, warn};

use crate::dedup::{claim_glitch, release_glitch_claim};
use crate::job::DispatchJobPayload;
use crate::tier_policy::TierPolicy;

/// The queue name one tier group's delayed jobs are scheduled onto. Stable
/// regardless of input ordering, mirroring [`DispatchJob::unique_id`]'s
/// sort-then-join so the dispatcher and the worker that spawns consumers
/// for each group agree on the name without sharing state.
pub fn queue_name_for_tiers(tiers: &[Tier]) -> String {
    let mut names: Vec<&'static str> = tiers.iter().map(|t| t.as_str()).collect();
    names.sort_unstable();
    format!("notify.tier.{}", names.join(","))
}

/// Consumes `anomaly.confirmed`: broadcasts synchronously, dedups, and
/// schedules one Delay Queue job per tier-delay group (§4.4).
pub struct GlitchDispatchHandler {
    kv: Arc<dyn Kv>,
    delay_queue: Arc<dyn DelayQueue>,
    channels: Arc<ChannelRegistry>,
    policy: TierPolicy,
    broadcast_channels: Vec<Channel>,
    dedup_ttl_seconds: u64,
}

impl GlitchDispatchHandler {
    pub fn new(
        kv: Arc<dyn Kv>,
        delay_queue: Arc<dyn DelayQueue>,
        channels: Arc<ChannelRegistry>,
        policy: TierPolicy,
        broadcast_channels: Vec<Channel>,
        dedup_ttl_seconds: u64,
    ) -> Self {
        Self {
            kv,
            delay_queue,
            channels,
            policy,
            broadcast_channels,
            dedup_ttl_seconds,
        }
    }

    async fn broadcast(&self, glitch: &ValidatedGlitch) {
        for channel in &self.broadcast_channels {
            let Some(provider) = self.channels.get(*channel) else {
                continue;
            };
            let outcome = provider.send(glitch, None).await;
            if outcome.success {
                info!(glitch_id = %glitch.id, channel = %channel, "broadcast sent");
            } else {
                warn!(glitch_id = %glitch.id, channel = %channel, error = ?outcome.error, "broadcast failed");
            }
            obs::NOTIFICATIONS_TOTAL
                .with_label_values(&["broadcast", channel.as_str(), if outcome.success { "success" } else { "failure" }])
                .inc();
            // label set is (tier, channel, outcome); broadcasts have no
            // per-tier target so "broadcast" fills the tier slot.
        }
    }
}

#[async_trait]
impl Handler for GlitchDispatchHandler {
    async fn handle(&self, entry: &stream_bus::StreamEntry) -> Result<(), ProcessingError> {
        let glitch: ValidatedGlitch = serde_json::from_slice(&entry.payload)
            .map_err(|e| ProcessingError::Malformed(e.to_string()))?;

        // §4.4 "Dedup": claimed before any scheduling happens. A glitch
        // already claimed is fully handled (or in flight) elsewhere; there
        // is nothing left for this invocation to do.
        if !claim_glitch(&*self.kv, &glitch.id, self.dedup_ttl_seconds).await {
            info!(glitch_id = %glitch.id, "glitch already dispatched, skipping");
            return Ok(());
        }

        self.broadcast(&glitch).await;

        for (tiers, delay) in self.policy.delay_groups() {
            let scheduled_at = Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default();
            let unique_id = DispatchJob::new(glitch.id.clone(), tiers.clone(), scheduled_at).unique_id();
            let payload = DispatchJobPayload {
                glitch: glitch.clone(),
                target_tiers: tiers.clone(),
            };
            let body = match serde_json::to_vec(&payload) {
                Ok(b) => b,
                Err(e) => {
                    warn!(glitch_id = %glitch.id, error = %e, "failed to serialize dispatch job payload");
                    continue;
                }
            };

            let queue = queue_name_for_tiers(&tiers);
            match self
                .delay_queue
                .add(&queue, body, delay.as_millis() as u64, Some(&unique_id))
                .await
            {
                Ok(_) => info!(glitch_id = %glitch.id, queue, delay_ms = delay.as_millis() as u64, "scheduled tier delivery"),
                Err(e) => {
                    // §5 Backpressure: a full Delay Queue is a transient
                    // failure, not a dropped job. Release the claim taken
                    // above so the retried invocation (§4.1) doesn't see
                    // the glitch as already dispatched and skip it; any
                    // group already scheduled above re-adds idempotently
                    // via `unique_id` next attempt.
                    warn!(glitch_id = %glitch.id, queue, error = %e, "failed to schedule tier delivery, will retry");
                    release_glitch_claim(&*self.kv, &glitch.id).await;
                    return Err(ProcessingError::Transient(format!(
                        "delay queue rejected job for queue {queue}: {e}"
                    )));
                }
            }
        }

        Ok(())
    }
}
