//! Caller-facing throttle facade.
//!
//! [`Throttler`] turns a [`RateProvider`] into a single admission call, with
//! an optional blocking mode that waits out the provider's estimate and
//! retries within a bounded budget.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, trace};

use crate::error::Result;
use crate::ratelimit::{FixedWindowProvider, PolicySet, RateProvider, RatioFactor};
use crate::store::CounterStore;

/// Default number of admission attempts in blocking mode.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
/// Default total time blocking mode may spend waiting.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(60);

/// Bounds on the blocking retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Admission attempts, including the first one
    pub max_attempts: u32,
    /// Total time that may be spent sleeping between attempts
    pub max_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            max_wait: DEFAULT_MAX_WAIT,
        }
    }
}

/// How a blocking admission ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Usage was recorded
    Admitted,
    /// The retry budget ran out, or the namespace can never admit
    Denied,
    /// The caller's shutdown signal fired while waiting
    Cancelled,
}

/// The throttle facade.
pub struct Throttler<P: RateProvider + ?Sized> {
    provider: Arc<P>,
    retry: RetryPolicy,
}

impl Throttler<FixedWindowProvider> {
    /// Build a fixed-window throttler, falling back to an in-memory store when
    /// `store` is `None`.
    pub fn from_policies(policies: PolicySet, store: Option<Arc<dyn CounterStore>>) -> Self {
        let mut builder = FixedWindowProvider::builder().policies(policies);
        if let Some(store) = store {
            builder = builder.store(store);
        }
        Self::new(Arc::new(builder.build()))
    }
}

impl<P: RateProvider + ?Sized> Throttler<P> {
    pub fn new(provider: Arc<P>) -> Self {
        Self {
            provider,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Throttle one unit of work.
    ///
    /// Returns `false` when the work was admitted and `increment` units were
    /// recorded, `true` when the caller must hold off. With `sleep` set, waits
    /// for capacity and retries within the [`RetryPolicy`] before giving up.
    ///
    /// An `increment` above the namespace's limit fails with
    /// [`ThrottleError::InvalidArgument`](crate::ThrottleError::InvalidArgument)
    /// instead of waiting.
    pub async fn throttle(&self, namespace: &str, sleep: bool, increment: u64) -> Result<bool> {
        let admitted = if sleep {
            self.throttle_with_shutdown(namespace, increment, std::future::pending())
                .await?
                == Admission::Admitted
        } else {
            self.provider.try_acquire(namespace, increment).await?
        };
        Ok(!admitted)
    }

    /// Blocking admission that gives up as soon as `signal` resolves.
    ///
    /// Store failures and an `increment` above the namespace's limit are
    /// returned at once and never retried. No store lock is held while waiting.
    pub async fn throttle_with_shutdown<F>(
        &self,
        namespace: &str,
        increment: u64,
        signal: F,
    ) -> Result<Admission>
    where
        F: Future<Output = ()> + Send,
    {
        tokio::pin!(signal);

        let max_attempts = self.retry.max_attempts.max(1);
        let mut waited = Duration::ZERO;

        for attempt in 1..=max_attempts {
            if self.provider.try_acquire(namespace, increment).await? {
                trace!(namespace, attempt, "Admitted");
                return Ok(Admission::Admitted);
            }

            if self.provider.get_limit(namespace)? == 0 {
                debug!(namespace, "Namespace never admits, not waiting");
                return Ok(Admission::Denied);
            }
            if attempt == max_attempts {
                break;
            }

            let wait = self.wait_time(namespace).await?;
            if waited + wait > self.retry.max_wait {
                debug!(
                    namespace,
                    wait_ms = wait.as_millis() as u64,
                    waited_ms = waited.as_millis() as u64,
                    "Wait budget exhausted"
                );
                return Ok(Admission::Denied);
            }

            trace!(
                namespace,
                attempt,
                wait_ms = wait.as_millis() as u64,
                "Waiting for capacity"
            );

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = &mut signal => {
                    info!(namespace, attempt, "Throttle wait cancelled");
                    return Ok(Admission::Cancelled);
                }
            }
            waited += wait;
        }

        debug!(namespace, attempts = max_attempts, "Retry attempts exhausted");
        Ok(Admission::Denied)
    }

    /// How long to sleep before the next attempt.
    ///
    /// The estimate is zero when one more unit would fit but the requested
    /// increment does not; in that case only a full reset frees enough room.
    async fn wait_time(&self, namespace: &str) -> Result<Duration> {
        let millis = match self.provider.get_estimate(namespace).await? {
            0 => self.provider.get_reset(namespace).await?,
            estimate => estimate,
        };
        Ok(Duration::from_millis(millis))
    }

    pub fn get_ratio(&self, namespace: &str, factor: RatioFactor) -> Result<f64> {
        self.provider.get_ratio(namespace, factor)
    }

    pub async fn get_usage(&self, namespace: &str) -> Result<u64> {
        self.provider.get_usage(namespace).await
    }

    pub fn get_limit(&self, namespace: &str) -> Result<u64> {
        self.provider.get_limit(namespace)
    }

    pub async fn has_limit(&self, namespace: &str) -> Result<bool> {
        self.provider.has_limit(namespace).await
    }

    pub async fn get_remaining(&self, namespace: &str) -> Result<u64> {
        self.provider.get_remaining(namespace).await
    }

    /// Milliseconds until the next unit can be admitted.
    pub async fn get_estimate(&self, namespace: &str) -> Result<u64> {
        self.provider.get_estimate(namespace).await
    }

    /// Milliseconds until the window fully resets.
    pub async fn get_reset(&self, namespace: &str) -> Result<u64> {
        self.provider.get_reset(namespace).await
    }
}

impl<P: RateProvider + ?Sized> Clone for Throttler<P> {
    fn clone(&self) -> Self {
        Self {
            provider: self.provider.clone(),
            retry: self.retry,
        }
    }
}
