use chrono::{DateTime, Utc};

use crate::channel::Channel;

/// §6 "Channel provider contract": the uniform result every provider
/// returns, regardless of what's behind it.
#[derive(Debug, Clone)]
pub struct DeliveryOutcome {
    pub success: bool,
    pub channel: Channel,
    pub message_id: Option<String>,
    pub error: Option<String>,
    pub sent_at: DateTime<Utc>,
}

impl DeliveryOutcome {
    pub fn success(channel: Channel, message_id: impl Into<String>) -> Self {
        Self {
            success: true,
            channel,
            message_id: Some(message_id.into()),
            error: None,
            sent_at: Utc::now(),
        }
    }

    pub fn failure(channel: Channel, error: impl Into<String>) -> Self {
        Self {
            success: false,
            channel,
            message_id: None,
            error: Some(error.into()),
            sent_at: Utc::now(),
        }
    }
}
