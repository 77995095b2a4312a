//! Redis Streams implementation of the `StreamBus` trait.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::{BusError, BusResult, EntryId, StreamBus, StreamEntry};

/// `StreamBus` implementation backed by Redis Streams (`XADD`/`XRANGE`/`XLEN`).
///
/// This is the production implementation. It wraps a
/// [`redis::aio::ConnectionManager`], which reconnects transparently, so
/// callers don't need to handle dropped connections themselves.
///
/// # Example
/// ```rust,no_run
/// use stream_bus::RedisStreamBus;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = redis::Client::open("redis://localhost:6379")?;
/// let bus = RedisStreamBus::connect(client).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RedisStreamBus {
    conn: ConnectionManager,
}

impl RedisStreamBus {
    /// Connect using an already-built `redis::Client`.
    pub async fn connect(client: redis::Client) -> BusResult<Self> {
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| BusError::ConnectionError(e.to_string()))?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl StreamBus for RedisStreamBus {
    async fn xadd(&self, stream: &str, payload: Vec<u8>) -> BusResult<EntryId> {
        let mut conn = self.conn.clone();
        let id: String = conn
            .xadd(stream, "*", &[("payload", payload)])
            .await
            .map_err(|e| BusError::AppendError(e.to_string()))?;
        EntryId::parse(&id)
    }

    async fn xread(
        &self,
        stream: &str,
        after: &EntryId,
        count: usize,
    ) -> BusResult<Vec<StreamEntry>> {
        let mut conn = self.conn.clone();

        // XRANGE takes an *exclusive* start when given "(id", giving us
        // exactly the "strictly after" semantics the trait requires.
        let start = format!("({after}");
        let reply: redis::streams::StreamRangeReply = conn
            .xrange_count(stream, start, "+", count)
            .await
            .map_err(|e| BusError::ReadError(e.to_string()))?;

        reply
            .ids
            .into_iter()
            .map(|entry| {
                let id = EntryId::parse(&entry.id)?;
                let payload = entry
                    .map
                    .get("payload")
                    .ok_or_else(|| {
                        BusError::ReadError(format!("entry {} missing payload field", entry.id))
                    })
                    .and_then(|v| match v {
                        redis::Value::BulkString(bytes) => Ok(bytes.clone()),
                        other => Err(BusError::ReadError(format!(
                            "unexpected payload value type: {other:?}"
                        ))),
                    })?;
                Ok(StreamEntry { id, payload })
            })
            .collect()
    }

    async fn xlen(&self, stream: &str) -> BusResult<u64> {
        let mut conn = self.conn.clone();
        let len: u64 = conn
            .xlen(stream)
            .await
            .map_err(|e| BusError::ReadError(e.to_string()))?;
        Ok(len)
    }
}
