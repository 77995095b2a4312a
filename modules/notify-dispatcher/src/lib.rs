//! # Notify Dispatcher
//!
//! Turns a validated glitch into tiered, rate-limited, deduped deliveries
//! (§4.4). One handler consumes `anomaly.confirmed`, broadcasts to any
//! public channels synchronously, and schedules one Delay Queue job per
//! tier-delay group; a second handler, run per tier-group queue, pops due
//! jobs and fans them out to every eligible subscriber through
//! [`channel_providers::ChannelRegistry`].
//!
//! The tier-to-channel/delay/cap mapping lives in [`TierPolicy`] as data,
//! not as a `match` over [`domain::Tier`] scattered through the dispatch
//! logic, per §4.4's "does not enumerate tiers in code".

mod anomaly_status;
mod dedup;
mod delay_consumer;
mod dispatcher;
mod job;
mod preference_filter;
mod rate_limit;
mod subscriber;
mod tier_policy;

pub use anomaly_status::{anomaly_is_notified, mark_anomaly_notified};
pub use delay_consumer::TierDeliveryHandler;
pub use dispatcher::{queue_name_for_tiers, GlitchDispatchHandler};
pub use job::DispatchJobPayload;
pub use subscriber::{InMemorySubscriberStore, Preferences, Subscriber, SubscriberStore};
pub use tier_policy::TierPolicy;
