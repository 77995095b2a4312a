//! # Channel Providers
//!
//! A uniform `send()` facade (§6 "Channel provider contract") over the
//! delivery channels a tier-policy table may authorize: email, SMS, chat,
//! IM, rich-message, webhook and priority push. The actual provider SDK
//! internals behind each channel are out of scope (§1); what's implemented
//! here is the contract-shaped HTTP boundary the dispatcher calls through.

mod channel;
mod error;
mod http_provider;
mod outcome;
mod provider;
mod registry;

pub use channel::Channel;
pub use error::ProviderConfigError;
pub use http_provider::{HttpChannelProvider, WebhookProvider};
pub use outcome::DeliveryOutcome;
pub use provider::ChannelProvider;
pub use registry::ChannelRegistry;
