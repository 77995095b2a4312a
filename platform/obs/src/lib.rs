//! # Obs
//!
//! Tracing initialization and the Prometheus metrics registry shared by
//! `pricehawk-worker`'s two long-running tasks (the AI validator and the
//! notification dispatcher) and by the HTTP server that serves `/metrics`
//! alongside `health`'s `/healthz`/`/readyz`.
//!
//! Metric shapes (`IntCounterVec`, `HistogramVec`, `IntGaugeVec`, and a
//! `dep_up` gauge for downstream reachability) follow the same registry
//! pattern the platform's other services use; `/metrics` is served with
//! [`prometheus::TextEncoder`] rather than a hand-rolled formatter, since
//! the text exposition format already is the simple `name{tag="v"} value`
//! lines the pipeline's metrics endpoint calls for.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use lazy_static::lazy_static;
use prometheus::{
    HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};
use tracing_subscriber::EnvFilter;

lazy_static! {
    static ref REGISTRY: Registry = Registry::new();

    /// Events appended to / read off the stream bus, by stream and outcome
    /// (`ingested`, `processed`, `retried`, `dead_lettered`).
    pub static ref EVENTS_TOTAL: IntCounterVec = {
        let c = IntCounterVec::new(
            Opts::new("pricehawk_events_total", "Stream events by stream and outcome"),
            &["stream", "outcome"],
        )
        .expect("metric names are valid");
        REGISTRY.register(Box::new(c.clone())).expect("first registration");
        c
    };

    /// Validator decisions, by decision (`notify`, `suppress`) and the
    /// model id that produced them.
    pub static ref VALIDATIONS_TOTAL: IntCounterVec = {
        let c = IntCounterVec::new(
            Opts::new("pricehawk_validations_total", "AI validator decisions by decision and model"),
            &["decision", "model_id"],
        )
        .expect("metric names are valid");
        REGISTRY.register(Box::new(c.clone())).expect("first registration");
        c
    };

    /// Notification dispatch attempts, by tier, channel and outcome.
    pub static ref NOTIFICATIONS_TOTAL: IntCounterVec = {
        let c = IntCounterVec::new(
            Opts::new("pricehawk_notifications_total", "Dispatch attempts by tier, channel and outcome"),
            &["tier", "channel", "outcome"],
        )
        .expect("metric names are valid");
        REGISTRY.register(Box::new(c.clone())).expect("first registration");
        c
    };

    /// Circuit breaker state transitions, by model id and the state
    /// transitioned into (`open`, `half_open`, `closed`).
    pub static ref CIRCUIT_TRANSITIONS_TOTAL: IntCounterVec = {
        let c = IntCounterVec::new(
            Opts::new("pricehawk_circuit_transitions_total", "Circuit breaker transitions by model and new state"),
            &["model_id", "state"],
        )
        .expect("metric names are valid");
        REGISTRY.register(Box::new(c.clone())).expect("first registration");
        c
    };

    /// Current circuit breaker state per model: 0 closed, 1 open, 2 half-open.
    pub static ref CIRCUIT_STATE: IntGaugeVec = {
        let g = IntGaugeVec::new(
            Opts::new("pricehawk_circuit_state", "Current circuit breaker state (0=closed,1=open,2=half_open)"),
            &["model_id"],
        )
        .expect("metric names are valid");
        REGISTRY.register(Box::new(g.clone())).expect("first registration");
        g
    };

    /// Reachability of a downstream dependency (1 up, 0 down), refreshed by
    /// each `/readyz` poll.
    pub static ref DEP_UP: IntGaugeVec = {
        let g = IntGaugeVec::new(
            Opts::new("pricehawk_dep_up", "Downstream dependency reachability (1=up, 0=down)"),
            &["dependency"],
        )
        .expect("metric names are valid");
        REGISTRY.register(Box::new(g.clone())).expect("first registration");
        g
    };

    /// Handler duration in seconds, by pipeline stage (`validate`, `dispatch`).
    pub static ref HANDLER_DURATION_SECONDS: HistogramVec = {
        let h = HistogramVec::new(
            HistogramOpts::new("pricehawk_handler_duration_seconds", "Handler duration by stage"),
            &["stage"],
        )
        .expect("metric names are valid");
        REGISTRY.register(Box::new(h.clone())).expect("first registration");
        h
    };
}

/// Initialize the global `tracing` subscriber: `EnvFilter` from `RUST_LOG`
/// (defaulting to `info`) with structured JSON output, matching the
/// platform's production logging convention.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .json()
        .init();
}

/// Record a downstream dependency's reachability for the `pricehawk_dep_up`
/// gauge, called from the readiness probe after each check.
pub fn record_dep_up(dependency: &str, up: bool) {
    DEP_UP
        .with_label_values(&[dependency])
        .set(if up { 1 } else { 0 });
}

/// Render the registry in Prometheus text exposition format, for mounting
/// as the worker's `/metrics` handler.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %err, "failed to encode metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, String::new());
    }
    (StatusCode::OK, String::from_utf8(buffer).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment_independently_per_label_set() {
        EVENTS_TOTAL.with_label_values(&["events.pricing_anomaly", "ingested"]).inc();
        EVENTS_TOTAL.with_label_values(&["events.pricing_anomaly", "ingested"]).inc();
        EVENTS_TOTAL.with_label_values(&["events.pricing_anomaly", "dead_lettered"]).inc();

        assert_eq!(
            EVENTS_TOTAL
                .with_label_values(&["events.pricing_anomaly", "ingested"])
                .get(),
            2
        );
        assert_eq!(
            EVENTS_TOTAL
                .with_label_values(&["events.pricing_anomaly", "dead_lettered"])
                .get(),
            1
        );
    }

    #[test]
    fn dep_up_reflects_last_recorded_value() {
        record_dep_up("redis", true);
        assert_eq!(DEP_UP.with_label_values(&["redis"]).get(), 1);
        record_dep_up("redis", false);
        assert_eq!(DEP_UP.with_label_values(&["redis"]).get(), 0);
    }

    #[tokio::test]
    async fn metrics_handler_emits_registered_series() {
        EVENTS_TOTAL.with_label_values(&["events.pricing_anomaly", "ingested"]).inc();
        let response = metrics_handler().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
