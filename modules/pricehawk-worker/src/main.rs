//! The pricing-anomaly pipeline's worker process.
//!
//! Wires the platform adapters (stream bus, KV store, delay queue) to the
//! two consumers described in §4.3/§4.4 — the AI validator and the
//! notification dispatcher — and serves `/healthz`, `/readyz` and
//! `/metrics` alongside them. Both consumers and every delay-queue worker
//! share one [`ShutdownCoordinator`] so a single SIGTERM drains the whole
//! process in step.

use std::env;
use std::sync::Arc;

use ai_validator::{ModelClient, Validator};
use axum::Router;
use channel_providers::ChannelRegistry;
use kv_store::{InMemoryKv, Kv, RedisKv};
use model_router::{load_pool, ModelRouter, RouterConfig};
use notify_dispatcher::{
    GlitchDispatchHandler, InMemorySubscriberStore, SubscriberStore, TierDeliveryHandler, TierPolicy,
};
use pricehawk_config::Settings;
use shutdown::ShutdownCoordinator;
use stream_bus::{InMemoryStreamBus, RedisStreamBus, StreamBus};
use stream_consumer::ConsumerConfig;
use tracing::info;

const DETECTED_STREAM: &str = "anomaly.detected";
const CONFIRMED_STREAM: &str = "anomaly.confirmed";
const CONSUMER_GROUP: &str = "pricehawk";

#[tokio::main]
async fn main() {
    obs::init_tracing();

    let settings = Settings::from_env().expect("failed to load settings from environment");
    info!(port = settings.port, redis_url = %settings.redis_url, "starting pricehawk-worker");

    let (bus, kv, delay_queue): (
        Arc<dyn StreamBus>,
        Arc<dyn Kv>,
        Arc<dyn delay_queue::DelayQueue>,
    ) = if env::var("PRICEHAWK_IN_MEMORY").ok().as_deref() == Some("1") {
        info!("running with in-memory adapters (PRICEHAWK_IN_MEMORY=1)");
        (
            Arc::new(InMemoryStreamBus::default()),
            Arc::new(InMemoryKv::new()),
            Arc::new(delay_queue::InMemoryDelayQueue::new()),
        )
    } else {
        let client = redis::Client::open(settings.redis_url.clone())
            .expect("REDIS_URL must be a valid redis connection string");
        let bus = RedisStreamBus::connect(client.clone())
            .await
            .expect("failed to connect stream bus to redis");
        let kv = RedisKv::connect(client.clone())
            .await
            .expect("failed to connect kv store to redis");
        let delay_queue = delay_queue::RedisDelayQueue::connect(client)
            .await
            .expect("failed to connect delay queue to redis");
        (Arc::new(bus), Arc::new(kv), Arc::new(delay_queue))
    };

    let shutdown = ShutdownCoordinator::new(settings.graceful_shutdown_timeout);

    let router_cfg = RouterConfig {
        enable_sota_models: settings.enable_sota_models,
        circuit: model_router::CircuitBreakerConfig {
            window_threshold: settings.circuit_breaker_threshold,
            window: settings.circuit_breaker_window,
        },
    };
    let model_router = Arc::new(ModelRouter::new(load_pool(), kv.clone(), router_cfg).await);

    let model_endpoint = env::var("MODEL_ENDPOINT_URL")
        .unwrap_or_else(|_| "http://localhost:9000/v1/chat/completions".to_string());
    let model_client = ModelClient::new(model_endpoint);

    let validator = Arc::new(Validator::new(
        model_router.clone(),
        model_client,
        bus.clone(),
        CONFIRMED_STREAM,
    ));

    let channels = Arc::new(ChannelRegistry::from_env());
    let tier_policy = TierPolicy::default();
    let subscribers: Arc<dyn SubscriberStore> = Arc::new(InMemorySubscriberStore::default());

    let dispatcher = Arc::new(GlitchDispatchHandler::new(
        kv.clone(),
        delay_queue.clone(),
        channels.clone(),
        tier_policy.clone(),
        vec![],
        settings.notify_dedup_ttl_seconds,
    ));

    let consumer_cfg = ConsumerConfig {
        batch_size: settings.stream_batch_size,
        poll_interval: settings.stream_poll_interval,
        max_retries: settings.stream_max_retries,
    };

    let validator_task = tokio::spawn(stream_consumer::run(
        bus.clone(),
        kv.clone(),
        DETECTED_STREAM,
        CONSUMER_GROUP,
        validator,
        consumer_cfg.clone(),
        shutdown.clone(),
    ));

    let dispatcher_task = tokio::spawn(stream_consumer::run(
        bus.clone(),
        kv.clone(),
        CONFIRMED_STREAM,
        CONSUMER_GROUP,
        dispatcher,
        consumer_cfg,
        shutdown.clone(),
    ));

    // One delay-queue consumer per tier-delay group, so e.g. the "free"
    // tier's three-day-delayed jobs never block the zero-delay pro/elite
    // queue from draining.
    let mut delay_tasks = Vec::new();
    for (tiers, _) in tier_policy.delay_groups() {
        let queue = notify_dispatcher::queue_name_for_tiers(&tiers);
        let handler: Arc<dyn delay_queue::DelayQueueHandler> = Arc::new(TierDeliveryHandler::new(
            kv.clone(),
            subscribers.clone(),
            channels.clone(),
            tier_policy.clone(),
        ));
        let delay_queue = delay_queue.clone();
        let shutdown_rx = shutdown.subscribe();
        delay_tasks.push(tokio::spawn(async move {
            let _ = delay_queue.consume(&queue, 8, handler, shutdown_rx).await;
        }));
    }

    let health_state = health::HealthState::new(bus.clone(), kv.clone(), DETECTED_STREAM);
    let app: Router = Router::new()
        .merge(health::router(health_state))
        .route("/metrics", axum::routing::get(obs::metrics_handler));

    let addr = format!("{}:{}", settings.host, settings.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {addr}: {e}"));
    info!(%addr, "health/metrics server listening");

    let server_shutdown = shutdown.clone();
    let server_task = tokio::spawn(async move {
        let mut rx = server_shutdown.subscribe();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = rx.changed().await;
            })
            .await
            .expect("health server failed");
    });

    shutdown.run_until_signal().await;

    let _ = tokio::join!(validator_task, dispatcher_task, server_task);
    for task in delay_tasks {
        let _ = task.await;
    }
}
