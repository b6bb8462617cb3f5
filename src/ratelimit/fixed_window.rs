//! Fixed-window rate provider.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, trace};

use super::namespace::validate_namespace;
use super::policy::{LimitPolicy, PolicySet};
use super::provider::RateProvider;
use super::ratio::RatioFactor;
use crate::clock::{Clock, SystemClock};
use crate::error::{Result, ThrottleError};
use crate::store::{CounterStore, MemoryStore, UsageRecord};

/// Rate provider that counts usage in fixed windows.
///
/// A namespace's window opens with its first recorded unit and lasts for the
/// policy's window length; once it has fully elapsed the next access starts
/// from zero. All state lives in the counter store.
pub struct FixedWindowProvider<C: Clock = SystemClock> {
    /// Usage records indexed by namespace
    store: Arc<dyn CounterStore>,
    /// Configured limits
    policies: PolicySet,
    clock: C,
}

/// A namespace's state at one instant, read from a single store access.
struct WindowState {
    policy: LimitPolicy,
    /// The record if its window is still open
    active: Option<UsageRecord>,
    now: u64,
}

impl WindowState {
    fn usage(&self) -> u64 {
        self.active.map_or(0, |r| r.count)
    }

    fn admits(&self) -> bool {
        !self.policy.is_blocked() && self.usage() < self.policy.limit()
    }

    fn millis_until_reset(&self) -> u64 {
        let window_ms = self.policy.window().millis();
        self.active
            .map_or(0, |r| window_ms.saturating_sub(r.elapsed(self.now)))
    }
}

impl FixedWindowProvider<SystemClock> {
    /// Create a provider with the given policies, an in-memory store and the
    /// system clock.
    pub fn new(policies: PolicySet) -> Self {
        Self::builder().policies(policies).build()
    }

    pub fn builder() -> FixedWindowProviderBuilder<SystemClock> {
        FixedWindowProviderBuilder::new()
    }
}

impl<C: Clock> FixedWindowProvider<C> {
    /// Read a namespace's record and classify it against its window.
    async fn window_state(&self, namespace: &str) -> Result<WindowState> {
        validate_namespace(namespace)?;

        let policy = *self.policies.resolve(namespace);
        let now = self.clock.now_millis();
        let active = self
            .store
            .get(namespace)
            .await?
            .filter(|r| !r.is_expired(policy.window().millis(), now));

        trace!(
            namespace,
            usage = active.map_or(0, |r| r.count),
            limit = policy.limit(),
            "Read window state"
        );

        Ok(WindowState {
            policy,
            active,
            now,
        })
    }

    fn validate_amount(amount: u64) -> Result<()> {
        if amount == 0 {
            return Err(ThrottleError::InvalidArgument(
                "increment amount must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl<C: Clock> RateProvider for FixedWindowProvider<C> {
    async fn has_limit(&self, namespace: &str) -> Result<bool> {
        Ok(self.window_state(namespace).await?.admits())
    }

    async fn increment_usage(&self, namespace: &str, amount: u64) -> Result<()> {
        Self::validate_amount(amount)?;
        validate_namespace(namespace)?;

        let policy = self.policies.resolve(namespace);
        let now = self.clock.now_millis();
        let record = self
            .store
            .increment(namespace, amount, policy.window().millis(), now)
            .await?;

        if record.window_start == now && record.count == amount {
            debug!(namespace, "Opened new window");
        }
        if record.count >= policy.limit() {
            debug!(
                namespace,
                count = record.count,
                limit = policy.limit(),
                "Namespace saturated"
            );
        }
        Ok(())
    }

    async fn try_acquire(&self, namespace: &str, amount: u64) -> Result<bool> {
        Self::validate_amount(amount)?;
        validate_namespace(namespace)?;

        let policy = self.policies.resolve(namespace);
        if policy.is_blocked() {
            trace!(namespace, "Namespace is blocked");
            return Ok(false);
        }
        if amount > policy.limit() {
            return Err(ThrottleError::InvalidArgument(format!(
                "increment {} exceeds the limit of {} for namespace {:?}",
                amount,
                policy.limit(),
                namespace
            )));
        }

        let acquisition = self
            .store
            .acquire(
                namespace,
                amount,
                policy.limit(),
                policy.window().millis(),
                self.clock.now_millis(),
            )
            .await?;

        trace!(
            namespace,
            amount,
            admitted = acquisition.admitted,
            count = acquisition.record.count,
            "Checked admission"
        );

        if !acquisition.admitted {
            debug!(
                namespace,
                count = acquisition.record.count,
                limit = policy.limit(),
                "Rate limit exceeded"
            );
        }
        Ok(acquisition.admitted)
    }

    async fn get_usage(&self, namespace: &str) -> Result<u64> {
        Ok(self.window_state(namespace).await?.usage())
    }

    fn get_limit(&self, namespace: &str) -> Result<u64> {
        validate_namespace(namespace)?;
        Ok(self.policies.resolve(namespace).limit())
    }

    async fn get_remaining(&self, namespace: &str) -> Result<u64> {
        let state = self.window_state(namespace).await?;
        Ok(state.policy.limit().saturating_sub(state.usage()))
    }

    fn get_ratio(&self, namespace: &str, factor: RatioFactor) -> Result<f64> {
        validate_namespace(namespace)?;
        let policy = self.policies.resolve(namespace);
        Ok(factor.ratio(policy.limit(), policy.window().millis()))
    }

    async fn get_estimate(&self, namespace: &str) -> Result<u64> {
        let state = self.window_state(namespace).await?;

        if state.admits() {
            return Ok(0);
        }
        if state.policy.is_blocked() {
            // Never reopens; report a full window each time.
            return Ok(state.policy.window().millis().max(1));
        }
        Ok(state.millis_until_reset().max(1))
    }

    async fn get_reset(&self, namespace: &str) -> Result<u64> {
        Ok(self.window_state(namespace).await?.millis_until_reset())
    }

    fn storage(&self) -> Arc<dyn CounterStore> {
        self.store.clone()
    }
}

/// Builder for [`FixedWindowProvider`].
///
/// Without an explicit store the provider gets its own [`MemoryStore`].
pub struct FixedWindowProviderBuilder<C: Clock> {
    policies: PolicySet,
    store: Option<Arc<dyn CounterStore>>,
    clock: C,
}

impl FixedWindowProviderBuilder<SystemClock> {
    pub fn new() -> Self {
        Self {
            policies: PolicySet::default(),
            store: None,
            clock: SystemClock,
        }
    }
}

impl Default for FixedWindowProviderBuilder<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> FixedWindowProviderBuilder<C> {
    pub fn policies(mut self, policies: PolicySet) -> Self {
        self.policies = policies;
        self
    }

    /// Use a shared counter store instead of a private in-memory one.
    pub fn store(mut self, store: Arc<dyn CounterStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Replace the time source.
    pub fn clock<C2: Clock>(self, clock: C2) -> FixedWindowProviderBuilder<C2> {
        FixedWindowProviderBuilder {
            policies: self.policies,
            store: self.store,
            clock,
        }
    }

    pub fn build(self) -> FixedWindowProvider<C> {
        let store = self.store.unwrap_or_else(|| {
            debug!("No counter store supplied, using in-memory store");
            Arc::new(MemoryStore::new())
        });

        FixedWindowProvider {
            store,
            policies: self.policies,
            clock: self.clock,
        }
    }
}
