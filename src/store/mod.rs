//! Counter storage for per-namespace usage records.
//!
//! A store owns every [`UsageRecord`]; providers never cache counts between
//! calls and always read through the store, so several limiters (or several
//! processes, for a shared backend) observe the same state.

use async_trait::async_trait;

use crate::error::Result;

#[cfg(test)]
#[macro_use]
mod suite;

mod memory;
mod sharded;

#[cfg(test)]
pub(crate) mod unavailable;

pub use memory::MemoryStore;
pub use sharded::ShardedStore;

/// Usage accumulated by one namespace in its current window.
///
/// `count` and `window_start` always travel together; stores hand out copies
/// and never expose a half-updated record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageRecord {
    /// Units consumed since `window_start`
    pub count: u64,
    /// When the window opened, in milliseconds since the Unix epoch
    pub window_start: u64,
}

impl UsageRecord {
    /// An empty record whose window opens at `now`.
    pub fn fresh(now: u64) -> Self {
        Self {
            count: 0,
            window_start: now,
        }
    }

    /// Milliseconds since the window opened. A clock that stepped backwards
    /// reads as zero elapsed.
    pub fn elapsed(&self, now: u64) -> u64 {
        now.saturating_sub(self.window_start)
    }

    /// Whether a window of `window_ms` has fully elapsed at `now`.
    pub fn is_expired(&self, window_ms: u64, now: u64) -> bool {
        self.elapsed(now) >= window_ms
    }

    /// Start a new window at `now` if the current one has fully elapsed.
    fn roll_over(&mut self, window_ms: u64, now: u64) {
        if self.is_expired(window_ms, now) {
            *self = UsageRecord::fresh(now);
        }
    }

    /// Roll the window over if needed, then add `amount` unconditionally.
    pub(crate) fn add(&mut self, amount: u64, window_ms: u64, now: u64) {
        self.roll_over(window_ms, now);
        self.count = self.count.saturating_add(amount);
    }

    /// Roll the window over if needed, then add `amount` if it fits under `limit`.
    ///
    /// Returns whether the amount was committed.
    pub(crate) fn acquire(&mut self, amount: u64, limit: u64, window_ms: u64, now: u64) -> bool {
        self.roll_over(window_ms, now);

        match self.count.checked_add(amount) {
            Some(next) if next <= limit => {
                self.count = next;
                true
            }
            _ => false,
        }
    }
}

/// Outcome of an atomic [`CounterStore::acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acquisition {
    /// Whether the requested amount was admitted and recorded
    pub admitted: bool,
    /// The record after the operation (unchanged when not admitted)
    pub record: UsageRecord,
}

/// Storage backend for usage records.
///
/// Implementations must make every method atomic per namespace: two callers
/// incrementing the same namespace never lose an update, and a mutation is
/// visible to the next `get` from any caller sharing the store.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Current record for a namespace, or `None` if it has never been written
    /// (or was reset).
    async fn get(&self, namespace: &str) -> Result<Option<UsageRecord>>;

    /// Add `by` to the namespace's count and return the updated record.
    ///
    /// A missing record, or one whose `window_ms` window has elapsed at `now`,
    /// is replaced by `count = by` and `window_start = now` in the same atomic
    /// step, so concurrent increments across a rollover are never lost.
    async fn increment(
        &self,
        namespace: &str,
        by: u64,
        window_ms: u64,
        now: u64,
    ) -> Result<UsageRecord>;

    /// Forget the namespace's record.
    async fn reset(&self, namespace: &str) -> Result<()>;

    /// Admit `amount` only if it fits under `limit`, in one atomic step.
    ///
    /// An expired window (per `window_ms`) is rolled over first. Nothing is
    /// written when the amount is refused.
    async fn acquire(
        &self,
        namespace: &str,
        amount: u64,
        limit: u64,
        window_ms: u64,
        now: u64,
    ) -> Result<Acquisition>;
}
