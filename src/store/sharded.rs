//! Sharded in-process counter store backed by `DashMap`.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::trace;

use super::{Acquisition, CounterStore, UsageRecord};
use crate::error::Result;

/// An in-memory store that locks per shard instead of globally.
///
/// Namespaces hashing to different shards never contend, which keeps hot
/// multi-tenant workloads from serializing on one mutex.
#[derive(Debug, Default)]
pub struct ShardedStore {
    records: DashMap<String, UsageRecord>,
}

impl ShardedStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with room for `capacity` namespaces.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: DashMap::with_capacity(capacity),
        }
    }

    /// Number of namespaces with a record.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no namespace has a record.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop every record.
    pub fn clear(&self) {
        self.records.clear();
    }
}

#[async_trait]
impl CounterStore for ShardedStore {
    async fn get(&self, namespace: &str) -> Result<Option<UsageRecord>> {
        Ok(self.records.get(namespace).map(|r| *r))
    }

    async fn increment(
        &self,
        namespace: &str,
        by: u64,
        window_ms: u64,
        now: u64,
    ) -> Result<UsageRecord> {
        let mut record = self
            .records
            .entry(namespace.to_string())
            .or_insert_with(|| UsageRecord::fresh(now));
        record.add(by, window_ms, now);

        trace!(namespace, count = record.count, "Incremented usage");
        Ok(*record)
    }

    async fn reset(&self, namespace: &str) -> Result<()> {
        self.records.remove(namespace);
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
        // The entry guard holds the shard lock for the whole read-modify-write.
        match self.records.entry(namespace.to_string()) {
            Entry::Occupied(mut entry) => {
                let record = entry.get_mut();
                let admitted = record.acquire(amount, limit, window_ms, now);
                Ok(Acquisition {
                    admitted,
                    record: *record,
                })
            }
            Entry::Vacant(entry) => {
                let mut record = UsageRecord::fresh(now);
                let admitted = record.acquire(amount, limit, window_ms, now);
                if admitted {
                    entry.insert(record);
                }
                Ok(Acquisition { admitted, record })
            }
        }
    }
}
