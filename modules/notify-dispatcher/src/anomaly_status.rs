use kv_store::Kv;

/// §4.4 "Mark-notified side effect": once at least one channel has
/// succeeded for at least one subscriber of a confirmed glitch, the
/// originating anomaly moves to `notified`. Anomaly persistence itself is
/// out of scope (§1) — the dispatcher has no anomaly store to write a row
/// into — so this is tracked the same way every other cross-replica flag
/// in this pipeline is: a KV marker, set idempotently and never expired,
/// matching §3's "retained indefinitely (cold) once notified".
fn anomaly_status_key(anomaly_id: &str) -> String {
    format!("anomaly.status.{anomaly_id}")
}

pub async fn mark_anomaly_notified(kv: &dyn Kv, anomaly_id: &str) {
    let _ = kv.set(&anomaly_status_key(anomaly_id), "notified", None).await;
}

pub async fn anomaly_is_notified(kv: &dyn Kv, anomaly_id: &str) -> bool {
    matches!(kv.get(&anomaly_status_key(anomaly_id)).await, Ok(Some(v)) if v == "notified")
}
