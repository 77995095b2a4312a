use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use channel_providers::Channel;
use domain::Tier;

/// A subscriber's delivery preferences (§4.4 step 2, "preference filter").
#[derive(Debug, Clone, Default)]
pub struct Preferences {
    pub min_profit_margin: f64,
    pub categories: Vec<String>,
    pub retailers: Vec<String>,
    pub min_price: f64,
    pub max_price: f64,
    pub enabled_channels: HashSet<Channel>,
    /// The channel-specific destination (email address, phone number,
    /// chat id, webhook URL, ...), keyed by channel.
    pub addresses: HashMap<Channel, String>,
}

/// One active subscriber as the dispatcher sees it.
#[derive(Debug, Clone)]
pub struct Subscriber {
    pub user_id: String,
    pub tier: Tier,
    pub preferences: Preferences,
}

/// A port over wherever subscriber records actually live. §1 places
/// persistent storage schema out of scope for the core — this trait is
/// the seam a real database-backed implementation would sit behind.
#[async_trait]
pub trait SubscriberStore: Send + Sync {
    /// Active subscribers whose tier is one of `tiers`.
    async fn active_in_tiers(&self, tiers: &[Tier]) -> Vec<Subscriber>;
}

/// In-memory [`SubscriberStore`] for tests and local development.
#[derive(Default)]
pub struct InMemorySubscriberStore {
    subscribers: RwLock<Vec<Subscriber>>,
}

impl InMemorySubscriberStore {
    pub fn new(subscribers: Vec<Subscriber>) -> Self {
        Self {
            subscribers: RwLock::new(subscribers),
        }
    }

    pub fn add(&self, subscriber: Subscriber) {
        self.subscribers
            .write()
            .expect("subscriber store lock poisoned")
            .push(subscriber);
    }
}

#[async_trait]
impl SubscriberStore for InMemorySubscriberStore {
    async fn active_in_tiers(&self, tiers: &[Tier]) -> Vec<Subscriber> {
        self.subscribers
            .read()
            .expect("subscriber store lock poisoned")
            .iter()
            .filter(|s| tiers.contains(&s.tier))
            .cloned()
            .collect()
    }
}
