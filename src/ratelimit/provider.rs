//! Rate provider trait for abstracting over throttling algorithms.

use std::sync::Arc;

use async_trait::async_trait;

use super::ratio::RatioFactor;
use crate::error::Result;
use crate::store::CounterStore;

/// The capability set the throttle facade needs from an algorithm.
///
/// Every time-valued answer is in milliseconds. Implementations read through
/// their [`CounterStore`] on each call and surface store failures as errors
/// rather than guessing an admission decision.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Whether the namespace can currently admit more work.
    async fn has_limit(&self, namespace: &str) -> Result<bool>;

    /// Record `amount` units of usage. `amount` must be positive.
    async fn increment_usage(&self, namespace: &str, amount: u64) -> Result<()>;

    /// Check and record in one step. Returns whether `amount` was admitted.
    ///
    /// The default runs [`has_limit`](Self::has_limit) then
    /// [`increment_usage`](Self::increment_usage), which lets concurrent
    /// callers overshoot slightly; backends with an atomic path override it.
    ///
    /// An `amount` larger than the namespace's limit can never fit, so
    /// [`FixedWindowProvider`](super::FixedWindowProvider) rejects it with
    /// [`ThrottleError::InvalidArgument`](crate::ThrottleError::InvalidArgument)
    /// rather than answering `false` forever.
    async fn try_acquire(&self, namespace: &str, amount: u64) -> Result<bool> {
        if self.has_limit(namespace).await? {
            self.increment_usage(namespace, amount).await?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Units consumed in the active window (0 when fresh or expired).
    async fn get_usage(&self, namespace: &str) -> Result<u64>;

    /// Configured maximum per window.
    fn get_limit(&self, namespace: &str) -> Result<u64>;

    /// Units still available in the active window.
    async fn get_remaining(&self, namespace: &str) -> Result<u64> {
        let limit = self.get_limit(namespace)?;
        let usage = self.get_usage(namespace).await?;
        Ok(limit.saturating_sub(usage))
    }

    /// The limit expressed as a rate per `factor`.
    fn get_ratio(&self, namespace: &str, factor: RatioFactor) -> Result<f64>;

    /// Wait until at least one more unit can be admitted (0 when admitted now).
    async fn get_estimate(&self, namespace: &str) -> Result<u64>;

    /// Wait until usage fully returns to zero.
    async fn get_reset(&self, namespace: &str) -> Result<u64>;

    /// The store backing this provider.
    fn storage(&self) -> Arc<dyn CounterStore>;
}
