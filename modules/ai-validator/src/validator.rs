use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use domain::{AnomalyStatus, PricingAnomaly, ValidatedGlitch};
use model_router::{ModelRouter, UnicornContext};
use stream_bus::StreamBus;
use stream_consumer::{Handler, ProcessingError};
use tracing::{info, warn};
use uuid::Uuid;

use crate::client::ModelClient;
use crate::parse::parse_model_output;
use crate::prompt::build_prompt;

/// §4.3 step 6: "up to 3 attempts across distinct models".
const MAX_MODEL_ATTEMPTS: usize = 3;

/// Drives §4.3 end to end for one [`PricingAnomaly`] read off
/// `anomaly.detected`: select a model, call it, parse its output, and emit
/// a [`ValidatedGlitch`] onto `anomaly.confirmed` when the decision rule is
/// met.
pub struct Validator {
    router: Arc<ModelRouter>,
    client: ModelClient,
    bus: Arc<dyn StreamBus>,
    confirmed_stream: String,
}

impl Validator {
    pub fn new(
        router: Arc<ModelRouter>,
        client: ModelClient,
        bus: Arc<dyn StreamBus>,
        confirmed_stream: impl Into<String>,
    ) -> Self {
        Self {
            router,
            client,
            bus,
            confirmed_stream: confirmed_stream.into(),
        }
    }

    fn unicorn_context(anomaly: &PricingAnomaly) -> UnicornContext {
        UnicornContext {
            discount_percentage: anomaly.discount_percentage,
            confidence: Some(anomaly.initial_confidence),
            z_score: anomaly.z_score,
        }
    }

    /// §4.3 steps 1-6: select a model, call it, parse its output, retrying
    /// across up to [`MAX_MODEL_ATTEMPTS`] distinct models on transport or
    /// parse failure. Returns `None` if every attempt failed.
    async fn validate_with_retries(
        &self,
        anomaly: &PricingAnomaly,
    ) -> Option<(String, crate::parse::ModelOutput)> {
        let ctx = Self::unicorn_context(anomaly);
        let messages = build_prompt(anomaly);
        let mut tried = Vec::new();

        while tried.len() < MAX_MODEL_ATTEMPTS {
            let Some(model) = self.router.select_for_validation_excluding(&ctx, &tried).await
            else {
                warn!(anomaly_id = %anomaly.id, "no model available for validation");
                break;
            };

            let started = Instant::now();
            let outcome = self
                .client
                .call(&model.id, &messages, Duration::from_millis(model.timeout_ms))
                .await
                .and_then(|text| parse_model_output(&text));

            match outcome {
                Ok(output) => {
                    let latency_ms = started.elapsed().as_millis() as u64;
                    self.router.record_success(&model.id, latency_ms).await;
                    return Some((model.id, output));
                }
                Err(err) => {
                    warn!(anomaly_id = %anomaly.id, model_id = %model.id, error = %err, "model attempt failed");
                    self.router.record_failure(&model.id).await;
                    tried.push(model.id);
                }
            }
        }

        None
    }
}

#[async_trait]
impl Handler for Validator {
    async fn handle(&self, entry: &stream_bus::StreamEntry) -> Result<(), ProcessingError> {
        let mut anomaly: PricingAnomaly = serde_json::from_slice(&entry.payload)
            .map_err(|e| ProcessingError::Malformed(e.to_string()))?;

        let Some((model_id, output)) = self.validate_with_retries(&anomaly).await else {
            return Err(ProcessingError::Logical(
                "all model attempts failed for this anomaly".into(),
            ));
        };

        if output.is_glitch && output.confidence >= 50 {
            let profit_margin = ValidatedGlitch::compute_profit_margin(
                anomaly.product.original_price,
                anomaly.product.current_price,
                anomaly.discount_percentage,
            );

            let glitch = ValidatedGlitch {
                id: Uuid::new_v4().to_string(),
                anomaly_id: anomaly.id.clone(),
                product: anomaly.product.clone(),
                is_glitch: true,
                confidence: output.confidence,
                reasoning: output.reasoning,
                glitch_type: output.glitch_type,
                profit_margin,
                validated_at: Utc::now(),
            };

            if let Err(e) = anomaly.transition(AnomalyStatus::Validated) {
                warn!(anomaly_id = %anomaly.id, error = %e, "illegal status transition, continuing anyway");
            }

            let payload = serde_json::to_vec(&glitch)
                .map_err(|e| ProcessingError::Logical(format!("failed to serialize glitch: {e}")))?;
            self.bus
                .xadd(&self.confirmed_stream, payload)
                .await
                .map_err(|e| ProcessingError::Transient(e.to_string()))?;

            obs::VALIDATIONS_TOTAL
                .with_label_values(&["notify", &model_id])
                .inc();
            info!(anomaly_id = %anomaly.id, glitch_id = %glitch.id, model_id, "anomaly confirmed as glitch");
        } else {
            if let Err(e) = anomaly.transition(AnomalyStatus::Rejected) {
                warn!(anomaly_id = %anomaly.id, error = %e, "illegal status transition, continuing anyway");
            }
            obs::VALIDATIONS_TOTAL
                .with_label_values(&["suppress", &model_id])
                .inc();
            info!(anomaly_id = %anomaly.id, model_id, "anomaly rejected by validator");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{ModelConfig, ModelTier, ProductSnapshot, StockStatus};
    use kv_store::InMemoryKv;
    use model_router::RouterConfig;
    use stream_bus::InMemoryStreamBus;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_anomaly() -> PricingAnomaly {
        PricingAnomaly {
            id: "a1".into(),
            product: ProductSnapshot {
                title: "Widget".into(),
                current_price: 9.99,
                original_price: Some(999.99),
                stock_status: StockStatus::InStock,
                retailer_id: "amazon".into(),
                url: "https://example.com/widget".into(),
                category: "Electronics".into(),
            },
            anomaly_type: domain::AnomalyType::DecimalError,
            z_score: None,
            discount_percentage: Some(99.0),
            initial_confidence: 85,
            detected_at: Utc::now(),
            status: AnomalyStatus::Pending,
        }
    }

    fn test_model(id: &str, timeout_ms: u64) -> ModelConfig {
        ModelConfig {
            id: id.into(),
            name: id.into(),
            provider: "p".into(),
            base_weight: 50,
            context_window: 1000,
            tier: ModelTier::Base,
            capabilities: Default::default(),
            supports_tools: false,
            is_free: true,
            timeout_ms,
            enabled: true,
        }
    }

    #[tokio::test]
    async fn happy_path_emits_confirmed_glitch_with_expected_profit_margin() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "{\"is_glitch\":true,\"confidence\":95,\"reasoning\":\"decimal\",\"glitch_type\":\"decimal_error\"}"}}]
            })))
            .mount(&server)
            .await;

        let models = vec![test_model("m1", 5000)];
        let kv: Arc<dyn kv_store::Kv> = Arc::new(InMemoryKv::default());
        let router = Arc::new(ModelRouter::new(models, kv, RouterConfig::default()).await);
        let client = ModelClient::new(server.uri());
        let bus: Arc<dyn StreamBus> = Arc::new(InMemoryStreamBus::default());

        let validator = Validator::new(router, client, bus.clone(), "anomaly.confirmed");
        let payload = serde_json::to_vec(&test_anomaly()).unwrap();
        let entry = stream_bus::StreamEntry {
            id: stream_bus::EntryId::ZERO,
            payload,
        };

        validator.handle(&entry).await.unwrap();

        let confirmed = bus
            .xread("anomaly.confirmed", &stream_bus::EntryId::ZERO, 10)
            .await
            .unwrap();
        assert_eq!(confirmed.len(), 1);
        let glitch: ValidatedGlitch = serde_json::from_slice(&confirmed[0].payload).unwrap();
        assert!((glitch.profit_margin - 99.0).abs() < 0.1);
    }

    #[tokio::test]
    async fn low_confidence_rejects_without_emitting() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "{\"is_glitch\":true,\"confidence\":20,\"reasoning\":\"unclear\",\"glitch_type\":\"unknown\"}"}}]
            })))
            .mount(&server)
            .await;

        let models = vec![test_model("m1", 5000)];
        let kv: Arc<dyn kv_store::Kv> = Arc::new(InMemoryKv::default());
        let router = Arc::new(ModelRouter::new(models, kv, RouterConfig::default()).await);
        let client = ModelClient::new(server.uri());
        let bus: Arc<dyn StreamBus> = Arc::new(InMemoryStreamBus::default());

        let validator = Validator::new(router, client, bus.clone(), "anomaly.confirmed");
        let payload = serde_json::to_vec(&test_anomaly()).unwrap();
        let entry = stream_bus::StreamEntry {
            id: stream_bus::EntryId::ZERO,
            payload,
        };

        validator.handle(&entry).await.unwrap();

        let confirmed = bus
            .xread("anomaly.confirmed", &stream_bus::EntryId::ZERO, 10)
            .await
            .unwrap();
        assert!(confirmed.is_empty());
    }

    #[tokio::test]
    async fn malformed_payload_is_reported_as_malformed() {
        let models = vec![test_model("m1", 5000)];
        let kv: Arc<dyn kv_store::Kv> = Arc::new(InMemoryKv::default());
        let router = Arc::new(ModelRouter::new(models, kv, RouterConfig::default()).await);
        let client = ModelClient::new("http://127.0.0.1:1".into());
        let bus: Arc<dyn StreamBus> = Arc::new(InMemoryStreamBus::default());

        let validator = Validator::new(router, client, bus, "anomaly.confirmed");
        let entry = stream_bus::StreamEntry {
            id: stream_bus::EntryId::ZERO,
            payload: b"not json".to_vec(),
        };

        let err = validator.handle(&entry).await.unwrap_err();
        assert!(matches!(err, ProcessingError::Malformed(_)));
    }
}
