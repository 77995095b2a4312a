//! # Health
//!
//! Shared `/healthz` and `/readyz` endpoints mounted by every worker binary.
//!
//! `/healthz` is a liveness probe: it never touches a dependency and only
//! reports that the process is up. `/readyz` is a readiness probe: it
//! exercises the bus and the KV store (an `xlen`/`exists` round trip each)
//! and reports `503` the moment either is unreachable, so an orchestrator
//! can pull the instance out of rotation before it fails real work.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use kv_store::Kv;
use serde::{Deserialize, Serialize};
use stream_bus::StreamBus;

/// Dependencies the readiness probe checks reachability against.
#[derive(Clone)]
pub struct HealthState {
    bus: Arc<dyn StreamBus>,
    kv: Arc<dyn Kv>,
    /// A stream name known to exist (or to be harmlessly absent) that
    /// `/readyz` pings with `xlen` to confirm the bus connection is alive.
    probe_stream: String,
}

impl HealthState {
    pub fn new(bus: Arc<dyn StreamBus>, kv: Arc<dyn Kv>, probe_stream: impl Into<String>) -> Self {
        Self {
            bus,
            kv,
            probe_stream: probe_stream.into(),
        }
    }
}

/// Build the `/healthz` + `/readyz` router, ready to `.merge()` into a
/// worker's main axum `Router`.
pub fn router(state: HealthState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
    checked_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ReadyBody {
    status: String,
    checked_at: chrono::DateTime<chrono::Utc>,
    bus: String,
    kv: String,
}

async fn healthz() -> Json<HealthBody> {
    Json(HealthBody {
        status: "ok",
        checked_at: chrono::Utc::now(),
    })
}

async fn readyz(State(state): State<HealthState>) -> impl IntoResponse {
    let bus_ok = state.bus.xlen(&state.probe_stream).await.is_ok();
    let kv_ok = state.kv.exists("healthz.probe").await.is_ok();

    let body = ReadyBody {
        status: if bus_ok && kv_ok { "ok" } else { "degraded" }.to_string(),
        checked_at: chrono::Utc::now(),
        bus: if bus_ok { "reachable" } else { "unreachable" }.to_string(),
        kv: if kv_ok { "reachable" } else { "unreachable" }.to_string(),
    };

    let code = if bus_ok && kv_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (code, Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use kv_store::InMemoryKv;
    use http_body_util::BodyExt;
    use stream_bus::InMemoryStreamBus;
    use tower::ServiceExt;

    fn state() -> HealthState {
        HealthState::new(
            Arc::new(InMemoryStreamBus::default()),
            Arc::new(InMemoryKv::default()),
            "events.pricing_anomaly",
        )
    }

    #[tokio::test]
    async fn healthz_always_reports_ok() {
        let app = router(state());
        let response = app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn readyz_reports_ok_when_dependencies_reachable() {
        let app = router(state());
        let response = app
            .oneshot(Request::builder().uri("/readyz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: ReadyBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.bus, "reachable");
        assert_eq!(body.kv, "reachable");
    }
}
