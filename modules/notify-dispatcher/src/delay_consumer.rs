use std::sync::Arc;

use async_trait::async_trait;
use channel_providers::ChannelRegistry;
use chrono::Utc;
use delay_queue::DelayQueueHandler;
use kv_store::Kv;
use tracing::{info, warn};

use crate::anomaly_status::mark_anomaly_notified;
use crate::dedup::{mark_user_glitch_notified, user_glitch_is_fresh};
use crate::job::DispatchJobPayload;
use crate::preference_filter;
use crate::rate_limit::reserve;
use crate::subscriber::SubscriberStore;
use crate::tier_policy::TierPolicy;

/// Pops one tier group's delayed job and fans it out to every eligible,
/// still-active subscriber in that group's tiers (§4.4 steps 1-5).
pub struct TierDeliveryHandler {
    kv: Arc<dyn Kv>,
    subscribers: Arc<dyn SubscriberStore>,
    channels: Arc<ChannelRegistry>,
    policy: TierPolicy,
}

impl TierDeliveryHandler {
    pub fn new(
        kv: Arc<dyn Kv>,
        subscribers: Arc<dyn SubscriberStore>,
        channels: Arc<ChannelRegistry>,
        policy: TierPolicy,
    ) -> Self {
        Self {
            kv,
            subscribers,
            channels,
            policy,
        }
    }
}

#[async_trait]
impl DelayQueueHandler for TierDeliveryHandler {
    async fn handle(&self, payload: Vec<u8>) -> Result<(), String> {
        let job: DispatchJobPayload =
            serde_json::from_slice(&payload).map_err(|e| format!("malformed dispatch job: {e}"))?;

        let subscribers = self.subscribers.active_in_tiers(&job.target_tiers).await;
        let now = Utc::now();
        let mut any_user_notified = false;

        for subscriber in subscribers {
            if !preference_filter::passes(&job.glitch, &subscriber.preferences) {
                continue;
            }
            if !user_glitch_is_fresh(&*self.kv, &subscriber.user_id, &job.glitch.id).await {
                continue;
            }

            let mut any_success = false;
            for channel in &subscriber.preferences.enabled_channels {
                if !self.policy.allows(subscriber.tier, *channel) {
                    continue;
                }
                let Some(provider) = self.channels.get(*channel) else {
                    continue;
                };
                let max = self.policy.daily_cap(*channel);
                if !reserve(&*self.kv, &subscriber.user_id, *channel, now, max).await {
                    info!(user_id = %subscriber.user_id, %channel, "daily cap reached, skipping");
                    continue;
                }

                let target = subscriber.preferences.addresses.get(channel).map(String::as_str);
                let outcome = provider.send(&job.glitch, target).await;
                let outcome_label = if outcome.success { "success" } else { "failure" };
                obs::NOTIFICATIONS_TOTAL
                    .with_label_values(&[subscriber.tier.as_str(), channel.as_str(), outcome_label])
                    .inc();

                if outcome.success {
                    any_success = true;
                    info!(user_id = %subscriber.user_id, %channel, glitch_id = %job.glitch.id, "notified");
                } else {
                    warn!(user_id = %subscriber.user_id, %channel, error = ?outcome.error, "delivery failed");
                }
            }

            if any_success {
                mark_user_glitch_notified(&*self.kv, &subscriber.user_id, &job.glitch.id).await;
                any_user_notified = true;
            }
        }

        // §4.4 "Mark-notified side effect": one success for one user on
        // this tier group is enough to flip the originating anomaly to
        // `notified`; another tier group's job may reach this same line
        // later for the same anomaly, which is why the marker is
        // idempotent rather than a one-shot transition.
        if any_user_notified {
            mark_anomaly_notified(&*self.kv, &job.glitch.anomaly_id).await;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly_status::anomaly_is_notified;
    use crate::subscriber::{InMemorySubscriberStore, Preferences, Subscriber};
    use async_trait::async_trait;
    use channel_providers::{Channel, ChannelProvider, DeliveryOutcome};
    use domain::{GlitchType, ProductSnapshot, StockStatus, Tier, ValidatedGlitch};
    use kv_store::InMemoryKv;
    use std::collections::HashSet;

    struct AlwaysSucceeds;

    #[async_trait]
    impl ChannelProvider for AlwaysSucceeds {
        fn channel(&self) -> Channel {
            Channel::Email
        }

        async fn send(&self, _glitch: &ValidatedGlitch, _target: Option<&str>) -> DeliveryOutcome {
            DeliveryOutcome::success(Channel::Email, "msg-1")
        }
    }

    fn test_glitch() -> ValidatedGlitch {
        ValidatedGlitch {
            id: "g1".into(),
            anomaly_id: "a1".into(),
            product: ProductSnapshot {
                title: "Widget".into(),
                current_price: 9.99,
                original_price: Some(999.99),
                stock_status: StockStatus::InStock,
                retailer_id: "amazon".into(),
                url: "https://example.com/widget".into(),
                category: "Electronics".into(),
            },
            is_glitch: true,
            confidence: 95,
            reasoning: "decimal".into(),
            glitch_type: GlitchType::DecimalError,
            profit_margin: 99.0,
            validated_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn a_successful_delivery_marks_the_originating_anomaly_notified() {
        let kv: Arc<dyn Kv> = Arc::new(InMemoryKv::default());
        let mut channels = ChannelRegistry::default();
        channels.insert(Channel::Email, Arc::new(AlwaysSucceeds));
        let channels = Arc::new(channels);

        let mut enabled = HashSet::new();
        enabled.insert(Channel::Email);
        let subscribers = Arc::new(InMemorySubscriberStore::new(vec![Subscriber {
            user_id: "u1".into(),
            tier: Tier::Free,
            preferences: Preferences {
                min_profit_margin: 0.0,
                min_price: 0.0,
                max_price: f64::MAX,
                enabled_channels: enabled,
                ..Default::default()
            },
        }]));

        let handler = TierDeliveryHandler::new(kv.clone(), subscribers, channels, TierPolicy::default());
        let payload = DispatchJobPayload {
            glitch: test_glitch(),
            target_tiers: vec![Tier::Free],
        };

        handler.handle(serde_json::to_vec(&payload).unwrap()).await.unwrap();

        assert!(anomaly_is_notified(&*kv, "a1").await);
    }

    #[tokio::test]
    async fn no_eligible_subscribers_leaves_the_anomaly_unmarked() {
        let kv: Arc<dyn Kv> = Arc::new(InMemoryKv::default());
        let channels = Arc::new(ChannelRegistry::default());
        let subscribers = Arc::new(InMemorySubscriberStore::new(vec![]));

        let handler = TierDeliveryHandler::new(kv.clone(), subscribers, channels, TierPolicy::default());
        let payload = DispatchJobPayload {
            glitch: test_glitch(),
            target_tiers: vec![Tier::Free],
        };

        handler.handle(serde_json::to_vec(&payload).unwrap()).await.unwrap();

        assert!(!anomaly_is_notified(&*kv, "a1").await);
    }
}
