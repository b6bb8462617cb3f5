//! Single-lock in-process counter store.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::trace;

use super::{Acquisition, CounterStore, UsageRecord};
use crate::error::Result;

/// An in-memory store guarding all records with one mutex.
///
/// Suits a single process with a modest number of namespaces; every call holds
/// the lock only for the duration of a map lookup.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, UsageRecord>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of namespaces with a record.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether no namespace has a record.
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Drop every record.
    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn get(&self, namespace: &str) -> Result<Option<UsageRecord>> {
        Ok(self.records.lock().get(namespace).copied())
    }

    async fn increment(
        &self,
        namespace: &str,
        by: u64,
        window_ms: u64,
        now: u64,
    ) -> Result<UsageRecord> {
        let mut records = self.records.lock();
        let record = records
            .entry(namespace.to_string())
            .or_insert_with(|| UsageRecord::fresh(now));
        record.add(by, window_ms, now);

        trace!(namespace, count = record.count, "Incremented usage");
        Ok(*record)
    }

    async fn reset(&self, namespace: &str) -> Result<()> {
        self.records.lock().remove(namespace);
        Ok(())
    }

    async fn acquire(
        &self,
        namespace: &str,
        amount: u64,
        limit: u64,
        window_ms: u64,
        now: u64,
    ) -> Result<Acquisition> {
        let mut records = self.records.lock();

        let existing = records.get(namespace).copied();
        let mut record = existing.unwrap_or_else(|| UsageRecord::fresh(now));
        let admitted = record.acquire(amount, limit, window_ms, now);

        if admitted || existing.is_some() {
            records.insert(namespace.to_string(), record);
        }

        Ok(Acquisition { admitted, record })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    counter_store_suite!(MemoryStore::new());

    #[tokio::test]
    async fn test_len_and_clear() {
        let store = MemoryStore::new();
        assert!(store.is_empty());

        store.increment("a", 1, 1_000, 0).await.unwrap();
        store.increment("b", 1, 1_000, 0).await.unwrap();
        assert_eq!(store.len(), 2);

        store.clear();
        assert!(store.is_empty());
    }
}
