use std::env;
use std::time::Duration;

use async_trait::async_trait;
use domain::ValidatedGlitch;
use reqwest::Client;
use serde::Serialize;
use uuid::Uuid;

use crate::channel::Channel;
use crate::error::ProviderConfigError;
use crate::outcome::DeliveryOutcome;
use crate::provider::ChannelProvider;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    glitch_id: &'a str,
    title: &'a str,
    url: &'a str,
    profit_margin: f64,
    target: Option<&'a str>,
}

/// A provider whose outbound delivery is "POST the glitch to a configured
/// endpoint, authorized with a bearer credential" — the shape shared by
/// email, SMS, chat, IM, rich-message and priority channels here, since
/// their actual provider SDK internals are an external collaborator (§1
/// out of scope). The endpoint and credential are loaded once at startup
/// from `{PREFIX}_PROVIDER_URL` / `{PREFIX}_API_KEY`.
pub struct HttpChannelProvider {
    channel: Channel,
    http: Client,
    endpoint_url: String,
    api_key: String,
}

impl HttpChannelProvider {
    pub fn from_env(channel: Channel) -> Result<Self, ProviderConfigError> {
        let prefix = channel.env_prefix();
        let endpoint_url = env::var(format!("{prefix}_PROVIDER_URL"))
            .map_err(|_| ProviderConfigError::MissingEnvVar(format!("{prefix}_PROVIDER_URL")))?;
        let api_key = env::var(format!("{prefix}_API_KEY"))
            .map_err(|_| ProviderConfigError::MissingEnvVar(format!("{prefix}_API_KEY")))?;

        Ok(Self {
            channel,
            http: Client::builder()
                .build()
                .expect("reqwest client builder should not fail with no custom TLS config"),
            endpoint_url,
            api_key,
        })
    }
}

#[async_trait]
impl ChannelProvider for HttpChannelProvider {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn send(&self, glitch: &ValidatedGlitch, target: Option<&str>) -> DeliveryOutcome {
        let body = SendRequest {
            glitch_id: &glitch.id,
            title: &glitch.product.title,
            url: &glitch.product.url,
            profit_margin: glitch.profit_margin,
            target,
        };

        let response = self
            .http
            .post(&self.endpoint_url)
            .bearer_auth(&self.api_key)
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                DeliveryOutcome::success(self.channel, format!("{}-{}", self.channel, Uuid::new_v4()))
            }
            Ok(resp) => DeliveryOutcome::failure(
                self.channel,
                format!("provider returned status {}", resp.status()),
            ),
            Err(err) => DeliveryOutcome::failure(self.channel, err.to_string()),
        }
    }
}

/// The webhook channel targets the *subscriber's own* URL rather than a
/// shared provider endpoint, so it posts directly to `target` with an
/// optional shared signing secret instead of a per-provider API key.
pub struct WebhookProvider {
    http: Client,
    signing_secret: Option<String>,
}

impl WebhookProvider {
    pub fn from_env() -> Self {
        Self {
            http: Client::builder()
                .build()
                .expect("reqwest client builder should not fail with no custom TLS config"),
            signing_secret: env::var("WEBHOOK_SIGNING_SECRET").ok(),
        }
    }
}

#[async_trait]
impl ChannelProvider for WebhookProvider {
    fn channel(&self) -> Channel {
        Channel::Webhook
    }

    async fn send(&self, glitch: &ValidatedGlitch, target: Option<&str>) -> DeliveryOutcome {
        let Some(target_url) = target else {
            return DeliveryOutcome::failure(Channel::Webhook, "webhook channel requires a target URL");
        };

        let body = SendRequest {
            glitch_id: &glitch.id,
            title: &glitch.product.title,
            url: &glitch.product.url,
            profit_margin: glitch.profit_margin,
            target: None,
        };

        let mut request = self.http.post(target_url).timeout(REQUEST_TIMEOUT).json(&body);
        if let Some(secret) = &self.signing_secret {
            request = request.header("X-Webhook-Signature", secret);
        }

        match request.send().await {
            Ok(resp) if resp.status().is_success() => {
                DeliveryOutcome::success(Channel::Webhook, format!("webhook-{}", Uuid::new_v4()))
            }
            Ok(resp) => DeliveryOutcome::failure(
                Channel::Webhook,
                format!("webhook endpoint returned status {}", resp.status()),
            ),
            Err(err) => DeliveryOutcome::failure(Channel::Webhook, err.to_string()),
        }
    }
}
