use std::fmt;

/// A delivery channel a tier's subscribers may be reached on (§4.4 "Tier
/// policy table"). The dispatcher treats these as opaque identifiers —
/// which tier may use which channel is policy data, not code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Sms,
    Chat,
    Im,
    RichMessage,
    Webhook,
    Priority,
}

impl Channel {
    pub const ALL: [Channel; 7] = [
        Channel::Email,
        Channel::Sms,
        Channel::Chat,
        Channel::Im,
        Channel::RichMessage,
        Channel::Webhook,
        Channel::Priority,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Sms => "sms",
            Channel::Chat => "chat",
            Channel::Im => "im",
            Channel::RichMessage => "rich_message",
            Channel::Webhook => "webhook",
            Channel::Priority => "priority",
        }
    }

    /// Upper-snake-case form used to namespace this channel's environment
    /// variables, e.g. `Channel::RichMessage` -> `"RICH_MESSAGE"`.
    pub fn env_prefix(self) -> &'static str {
        match self {
            Channel::Email => "EMAIL",
            Channel::Sms => "SMS",
            Channel::Chat => "CHAT",
            Channel::Im => "IM",
            Channel::RichMessage => "RICH_MESSAGE",
            Channel::Webhook => "WEBHOOK",
            Channel::Priority => "PRIORITY",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_channels_round_trip_through_their_string_form() {
        for channel in Channel::ALL {
            assert_eq!(channel.as_str(), channel.to_string());
        }
    }
}
