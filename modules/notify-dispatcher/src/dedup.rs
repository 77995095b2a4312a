use kv_store::Kv;

/// 7 days, the per-user-per-glitch dedup TTL (§4.4 step 3).
const USER_GLITCH_DEDUP_TTL_SECONDS: u64 = 7 * 24 * 60 * 60;

fn glitch_dedup_key(glitch_id: &str) -> String {
    format!("notify.glitch.{glitch_id}")
}

fn user_glitch_dedup_key(user_id: &str, glitch_id: &str) -> String {
    format!("notify.user.{user_id}.glitch.{glitch_id}")
}

/// §4.4 "Dedup": set-if-absent before scheduling any delay jobs for a
/// glitch. Returns `true` if this call won the race and scheduling should
/// proceed; `false` means the glitch was already scheduled.
pub async fn claim_glitch(kv: &dyn Kv, glitch_id: &str, ttl_seconds: u64) -> bool {
    match kv.set_nx(&glitch_dedup_key(glitch_id), "1", Some(ttl_seconds)).await {
        Ok(claimed) => claimed,
        Err(_) => false,
    }
}

/// Releases a claim taken by [`claim_glitch`]. Used when scheduling fails
/// part-way through (e.g. the Delay Queue rejects an `add`) so the retried
/// invocation sees the glitch as unclaimed and reschedules it rather than
/// silently dropping the remaining tier groups.
pub async fn release_glitch_claim(kv: &dyn Kv, glitch_id: &str) {
    let _ = kv.del(&glitch_dedup_key(glitch_id)).await;
}

/// §4.4 step 3: per-user-per-glitch dedup. `true` means this (user,
/// glitch) pair has not been notified yet.
pub async fn user_glitch_is_fresh(kv: &dyn Kv, user_id: &str, glitch_id: &str) -> bool {
    matches!(kv.exists(&user_glitch_dedup_key(user_id, glitch_id)).await, Ok(false))
}

/// §4.4 step 5: "set on first successful channel" — called once per user
/// after processing, only if at least one channel succeeded.
pub async fn mark_user_glitch_notified(kv: &dyn Kv, user_id: &str, glitch_id: &str) {
    let _ = kv
        .set(
            &user_glitch_dedup_key(user_id, glitch_id),
            "1",
            Some(USER_GLITCH_DEDUP_TTL_SECONDS),
        )
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use kv_store::InMemoryKv;

    #[tokio::test]
    async fn claim_glitch_only_succeeds_once() {
        let kv = InMemoryKv::default();
        assert!(claim_glitch(&kv, "g1", 86_400).await);
        assert!(!claim_glitch(&kv, "g1", 86_400).await);
    }

    #[tokio::test]
    async fn user_glitch_dedup_round_trips() {
        let kv = InMemoryKv::default();
        assert!(user_glitch_is_fresh(&kv, "u1", "g1").await);
        mark_user_glitch_notified(&kv, "u1", "g1").await;
        assert!(!user_glitch_is_fresh(&kv, "u1", "g1").await);
        // A different glitch for the same user is unaffected.
        assert!(user_glitch_is_fresh(&kv, "u1", "g2").await);
    }
}
