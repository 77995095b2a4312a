use channel_providers::Channel;
use chrono::{DateTime, Utc};
use kv_store::Kv;

/// 24h TTL on the daily counter (§6: `{channel}.limit.{uid}.{yyyy-mm-dd}`).
const RESERVATION_TTL_SECONDS: u64 = 24 * 60 * 60;

/// §4.4 "WhatsApp-style per-user daily caps": reserve one send for `user`
/// on `channel` for the UTC day containing `now`, returning whether the
/// send is allowed. `max` is the channel's policy-configured daily cap;
/// `None` means the channel has no cap and every reservation succeeds
/// without touching KV.
pub async fn reserve(
    kv: &dyn Kv,
    user_id: &str,
    channel: Channel,
    now: DateTime<Utc>,
    max: Option<u32>,
) -> bool {
    let Some(max) = max else {
        return true;
    };

    let key = format!("{}.limit.{}.{}", channel, user_id, now.format("%Y-%m-%d"));
    match kv.incr(&key).await {
        Ok(count) => {
            if count == 1 {
                // first reservation of the day: refresh the TTL so the
                // counter expires with the day rather than lingering.
                let _ = kv.set(&key, &count.to_string(), Some(RESERVATION_TTL_SECONDS)).await;
            }
            count as u32 <= max
        }
        Err(_) => false,
    }
}
