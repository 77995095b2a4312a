use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::channel::Channel;
use crate::http_provider::{HttpChannelProvider, WebhookProvider};
use crate::provider::ChannelProvider;

/// Maps a [`Channel`] to the provider instance authorized to send on it.
/// Built once at startup; channels whose credentials are absent from the
/// environment are simply omitted (§7 "Config" kind — fail that channel
/// only, the rest of the dispatcher proceeds).
#[derive(Default)]
pub struct ChannelRegistry {
    providers: HashMap<Channel, Arc<dyn ChannelProvider>>,
}

impl ChannelRegistry {
    /// Build a registry from environment credentials, logging (not
    /// failing) any channel whose provider could not be constructed.
    pub fn from_env() -> Self {
        let mut providers: HashMap<Channel, Arc<dyn ChannelProvider>> = HashMap::new();

        for channel in Channel::ALL {
            if channel == Channel::Webhook {
                providers.insert(channel, Arc::new(WebhookProvider::from_env()));
                continue;
            }
            match HttpChannelProvider::from_env(channel) {
                Ok(provider) => {
                    providers.insert(channel, Arc::new(provider));
                }
                Err(err) => {
                    warn!(%channel, error = %err, "channel provider unavailable, credentials missing");
                }
            }
        }

        Self { providers }
    }

    pub fn get(&self, channel: Channel) -> Option<Arc<dyn ChannelProvider>> {
        self.providers.get(&channel).cloned()
    }

    pub fn insert(&mut self, channel: Channel, provider: Arc<dyn ChannelProvider>) {
        self.providers.insert(channel, provider);
    }
}
