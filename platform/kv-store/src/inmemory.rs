//! In-memory implementation of [`Kv`] for testing and development.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::{Kv, KvResult};

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self) -> bool {
        match self.expires_at {
            Some(at) => Instant::now() < at,
            None => true,
        }
    }
}

/// `Kv` implementation backed by an in-process map. Expiration is checked
/// lazily on access rather than via a background sweep — good enough for
/// unit tests and local development, not for production memory pressure.
#[derive(Default)]
pub struct InMemoryKv {
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Kv for InMemoryKv {
    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        let mut entries = self.entries.lock().expect("kv-store lock poisoned");
        match entries.get(key) {
            Some(entry) if entry.is_live() => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> KvResult<()> {
        let mut entries = self.entries.lock().expect("kv-store lock poisoned");
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: ttl_seconds.map(|s| Instant::now() + Duration::from_secs(s)),
            },
        );
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> KvResult<bool> {
        let mut entries = self.entries.lock().expect("kv-store lock poisoned");
        if let Some(existing) = entries.get(key) {
            if existing.is_live() {
                return Ok(false);
            }
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: ttl_seconds.map(|s| Instant::now() + Duration::from_secs(s)),
            },
        );
        Ok(true)
    }

    async fn incr(&self, key: &str) -> KvResult<i64> {
        let mut entries = self.entries.lock().expect("kv-store lock poisoned");
        let current = match entries.get(key) {
            Some(entry) if entry.is_live() => entry.value.parse::<i64>().unwrap_or(0),
            _ => 0,
        };
        let next = current + 1;
        let ttl = entries.get(key).and_then(|e| {
            e.expires_at
                .map(|at| at.saturating_duration_since(Instant::now()))
        });
        entries.insert(
            key.to_string(),
            Entry {
                value: next.to_string(),
                expires_at: ttl.map(|d| Instant::now() + d),
            },
        );
        Ok(next)
    }

    async fn exists(&self, key: &str) -> KvResult<bool> {
        Ok(self.get(key).await?.is_some())
    }

    async fn del(&self, key: &str) -> KvResult<()> {
        let mut entries = self.entries.lock().expect("kv-store lock poisoned");
        entries.remove(key);
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> KvResult<Vec<String>> {
        let entries = self.entries.lock().expect("kv-store lock poisoned");
        let prefix = pattern.trim_end_matches('*');
        Ok(entries
            .iter()
            .filter(|(k, v)| v.is_live() && k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_missing_key_is_none() {
        let kv = InMemoryKv::new();
        assert_eq!(kv.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let kv = InMemoryKv::new();
        kv.set("k", "v", None).await.unwrap();
        assert_eq!(kv.get("k").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn set_nx_only_succeeds_once() {
        let kv = InMemoryKv::new();
        assert!(kv.set_nx("k", "first", None).await.unwrap());
        assert!(!kv.set_nx("k", "second", None).await.unwrap());
        assert_eq!(kv.get("k").await.unwrap(), Some("first".to_string()));
    }

    #[tokio::test]
    async fn incr_starts_at_one_and_accumulates() {
        let kv = InMemoryKv::new();
        assert_eq!(kv.incr("counter").await.unwrap(), 1);
        assert_eq!(kv.incr("counter").await.unwrap(), 2);
        assert_eq!(kv.incr("counter").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn expired_entries_are_treated_as_absent() {
        let kv = InMemoryKv::new();
        kv.set("k", "v", Some(0)).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        assert_eq!(kv.get("k").await.unwrap(), None);
        assert!(!kv.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn del_removes_key() {
        let kv = InMemoryKv::new();
        kv.set("k", "v", None).await.unwrap();
        kv.del("k").await.unwrap();
        assert_eq!(kv.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn keys_matches_prefix_pattern() {
        let kv = InMemoryKv::new();
        kv.set("model.perf.a", "1", None).await.unwrap();
        kv.set("model.perf.b", "2", None).await.unwrap();
        kv.set("model.circuit.a", "3", None).await.unwrap();

        let mut matched = kv.keys("model.perf.*").await.unwrap();
        matched.sort();
        assert_eq!(matched, vec!["model.perf.a", "model.perf.b"]);
    }
}
