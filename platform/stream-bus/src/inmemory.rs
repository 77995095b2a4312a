//! In-memory implementation of [`StreamBus`] for testing and development.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::{BusResult, EntryId, StreamBus, StreamEntry};

/// `StreamBus` implementation backed by an in-process append-only log.
///
/// Suitable for unit tests and local development without a Redis server.
/// Unlike the teacher's `InMemoryBus` (a broadcast channel — fan-out only,
/// no replay), this keeps every appended entry so that `xread` can resume
/// from an arbitrary cursor, which the Stream Consumer Framework requires.
#[derive(Default)]
pub struct InMemoryStreamBus {
    streams: Mutex<HashMap<String, Vec<StreamEntry>>>,
}

impl InMemoryStreamBus {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StreamBus for InMemoryStreamBus {
    async fn xadd(&self, stream: &str, payload: Vec<u8>) -> BusResult<EntryId> {
        let mut streams = self.streams.lock().expect("stream-bus lock poisoned");
        let entries = streams.entry(stream.to_string()).or_default();
        let id = EntryId::next_after(entries.last().map(|e| e.id));
        entries.push(StreamEntry { id, payload });
        Ok(id)
    }

    async fn xread(
        &self,
        stream: &str,
        after: &EntryId,
        count: usize,
    ) -> BusResult<Vec<StreamEntry>> {
        let streams = self.streams.lock().expect("stream-bus lock poisoned");
        let Some(entries) = streams.get(stream) else {
            return Ok(Vec::new());
        };
        Ok(entries
            .iter()
            .filter(|e| e.id > *after)
            .take(count)
            .cloned()
            .collect())
    }

    async fn xlen(&self, stream: &str) -> BusResult<u64> {
        let streams = self.streams.lock().expect("stream-bus lock poisoned");
        Ok(streams.get(stream).map(|e| e.len()).unwrap_or(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_after_zero_returns_everything() {
        let bus = InMemoryStreamBus::new();
        bus.xadd("s", b"one".to_vec()).await.unwrap();
        bus.xadd("s", b"two".to_vec()).await.unwrap();

        let entries = bus.xread("s", &EntryId::ZERO, 10).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].payload, b"one");
        assert_eq!(entries[1].payload, b"two");
    }

    #[tokio::test]
    async fn read_resumes_strictly_after_cursor() {
        let bus = InMemoryStreamBus::new();
        let first = bus.xadd("s", b"one".to_vec()).await.unwrap();
        bus.xadd("s", b"two".to_vec()).await.unwrap();
        bus.xadd("s", b"three".to_vec()).await.unwrap();

        let entries = bus.xread("s", &first, 10).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].payload, b"two");
        assert_eq!(entries[1].payload, b"three");
    }

    #[tokio::test]
    async fn read_respects_count() {
        let bus = InMemoryStreamBus::new();
        for i in 0..5 {
            bus.xadd("s", vec![i]).await.unwrap();
        }
        let entries = bus.xread("s", &EntryId::ZERO, 2).await.unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[tokio::test]
    async fn xlen_counts_all_appended_entries() {
        let bus = InMemoryStreamBus::new();
        bus.xadd("s", b"a".to_vec()).await.unwrap();
        bus.xadd("s", b"b".to_vec()).await.unwrap();
        assert_eq!(bus.xlen("s").await.unwrap(), 2);
        assert_eq!(bus.xlen("missing").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn streams_are_independent() {
        let bus = InMemoryStreamBus::new();
        bus.xadd("a", b"1".to_vec()).await.unwrap();
        bus.xadd("b", b"2".to_vec()).await.unwrap();
        assert_eq!(bus.xread("a", &EntryId::ZERO, 10).await.unwrap().len(), 1);
        assert_eq!(bus.xread("b", &EntryId::ZERO, 10).await.unwrap().len(), 1);
    }
}
