use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::ValidatorError;
use crate::prompt::ChatMessage;

/// §6 "Model endpoint contract": JSON POST body sent to the configurable
/// model URL.
#[derive(Debug, Serialize)]
struct ModelRequest<'a> {
    model_id: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ModelResponse {
    #[serde(default)]
    choices: Vec<ModelChoice>,
}

#[derive(Debug, Deserialize)]
struct ModelChoice {
    message: ModelMessage,
}

#[derive(Debug, Default, Deserialize)]
struct ModelMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Thin HTTP client over the model endpoint contract, grounded in the same
/// request/response/error shape the platform uses for its other outbound
/// HTTP integrations: a `reqwest::Client`, a base URL, and a
/// `handle_response` helper that turns a non-2xx status into a typed error
/// instead of letting `reqwest` bubble up its own.
#[derive(Clone)]
pub struct ModelClient {
    http: Client,
    endpoint_url: String,
}

impl ModelClient {
    pub fn new(endpoint_url: String) -> Self {
        let http = Client::builder()
            .build()
            .expect("reqwest client builder should not fail with no custom TLS config");
        Self { http, endpoint_url }
    }

    /// Call the model endpoint with a request-scoped deadline (§4.3 step 3:
    /// "deadline = model's `timeout_ms`"). Returns the raw text content so
    /// the caller can run it through [`crate::parse::parse_model_output`].
    pub async fn call(
        &self,
        model_id: &str,
        messages: &[ChatMessage],
        deadline: Duration,
    ) -> Result<String, ValidatorError> {
        let body = ModelRequest {
            model_id,
            messages,
            temperature: Some(0.2),
            max_tokens: Some(512),
            response_format: Some("json_object"),
        };

        let response = self
            .http
            .post(&self.endpoint_url)
            .timeout(deadline)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ValidatorError::Timeout(deadline.as_millis() as u64)
                } else {
                    ValidatorError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ValidatorError::Status(status.as_u16()));
        }

        let parsed: ModelResponse = response
            .json()
            .await
            .map_err(|e| ValidatorError::Http(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|s| !s.trim().is_empty())
            .ok_or(ValidatorError::EmptyResponse)
    }
}
