use async_trait::async_trait;
use domain::ValidatedGlitch;

use crate::channel::Channel;
use crate::outcome::DeliveryOutcome;

/// §6 "Channel provider contract": a uniform `send()` regardless of what's
/// behind a channel. `target` is the channel-specific destination — an
/// email address, a phone number, a webhook URL — or `None` for broadcast
/// sends that don't target a specific subscriber.
///
/// A provider never propagates a failure past its own boundary (§7: "a
/// user whose SMS provider returns 4xx must not block other users' email
/// delivery") — `send` always resolves to an `Outcome`, success or not.
#[async_trait]
pub trait ChannelProvider: Send + Sync {
    fn channel(&self) -> Channel;

    async fn send(&self, glitch: &ValidatedGlitch, target: Option<&str>) -> DeliveryOutcome;
}
