//! Redis implementation of the `Kv` trait.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::{Kv, KvError, KvResult};

/// `Kv` implementation backed by Redis `GET`/`SET`/`INCR`/`DEL`/`KEYS`.
#[derive(Clone)]
pub struct RedisKv {
    conn: ConnectionManager,
}

impl RedisKv {
    pub async fn connect(client: redis::Client) -> KvResult<Self> {
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| KvError::ConnectionError(e.to_string()))?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl Kv for RedisKv {
    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(|e| KvError::Get(e.to_string()))
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> KvResult<()> {
        let mut conn = self.conn.clone();
        match ttl_seconds {
            Some(ttl) => conn
                .set_ex::<_, _, ()>(key, value, ttl)
                .await
                .map_err(|e| KvError::Set(e.to_string())),
            None => conn
                .set::<_, _, ()>(key, value)
                .await
                .map_err(|e| KvError::Set(e.to_string())),
        }
    }

    async fn set_nx(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> KvResult<bool> {
        let mut conn = self.conn.clone();
        let mut command = redis::cmd("SET");
        command.arg(key).arg(value).arg("NX");
        if let Some(ttl) = ttl_seconds {
            command.arg("EX").arg(ttl);
        }
        let reply: Option<String> = command
            .query_async(&mut conn)
            .await
            .map_err(|e| KvError::Set(e.to_string()))?;
        Ok(reply.is_some())
    }

    async fn incr(&self, key: &str) -> KvResult<i64> {
        let mut conn = self.conn.clone();
        conn.incr(key, 1)
            .await
            .map_err(|e| KvError::Incr(e.to_string()))
    }

    async fn exists(&self, key: &str) -> KvResult<bool> {
        let mut conn = self.conn.clone();
        conn.exists(key).await.map_err(|e| KvError::Get(e.to_string()))
    }

    async fn del(&self, key: &str) -> KvResult<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| KvError::Del(e.to_string()))
    }

    async fn keys(&self, pattern: &str) -> KvResult<Vec<String>> {
        let mut conn = self.conn.clone();
        conn.keys(pattern)
            .await
            .map_err(|e| KvError::Keys(e.to_string()))
    }
}
