//! A backend that is never reachable, for error propagation tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::{Acquisition, CounterStore, UsageRecord};
use crate::error::{Result, ThrottleError};

/// Fails every call with `StorageUnavailable` and counts the attempts.
#[derive(Debug, Default)]
pub(crate) struct UnavailableStore {
    calls: AtomicUsize,
}

impl UnavailableStore {
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail<T>(&self) -> Result<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ThrottleError::StorageUnavailable(
            "connection refused".to_string(),
        ))
    }
}

#[async_trait]
impl CounterStore for UnavailableStore {
    async fn get(&self, _namespace: &str) -> Result<Option<UsageRecord>> {
        self.fail()
    }

    async fn increment(
        &self,
        _namespace: &str,
        _by: u64,
        _window_ms: u64,
        _now: u64,
    ) -> Result<UsageRecord> {
        self.fail()
    }

    async fn reset(&self, _namespace: &str) -> Result<()> {
        self.fail()
    }

    async fn acquire(
        &self,
        _namespace: &str,
        _amount: u64,
        _limit: u64,
        _window_ms: u64,
        _now: u64,
    ) -> Result<Acquisition> {
        self.fail()
    }
}
