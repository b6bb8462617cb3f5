//! Configuration management for the throttler.
//!
//! Policies are described per namespace in YAML, using the same
//! `requests_per_unit` / `unit` vocabulary as Envoy rate limit rules:
//!
//! ```yaml
//! default_policy:
//!   requests_per_unit: 100
//!   unit: minute
//! namespaces:
//!   premium:
//!     requests_per_unit: 10000
//!     unit: minute
//!   banned:
//!     blocked: true
//! retry:
//!   max_attempts: 5
//!   max_wait_ms: 30000
//! store: sharded
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, ThrottleError};
use crate::ratelimit::{
    FixedWindowProvider, LimitPolicy, PolicySet, TimeWindow, DEFAULT_LIMIT,
};
use crate::store::{CounterStore, MemoryStore, ShardedStore};
use crate::throttler::{RetryPolicy, Throttler, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_WAIT};

/// Prefix for environment overrides, e.g. `THROTTLER__RETRY__MAX_ATTEMPTS=3`.
pub const ENV_PREFIX: &str = "THROTTLER";

/// Main configuration for the throttler.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThrottlerConfig {
    /// Policy for namespaces without an override
    #[serde(default)]
    pub default_policy: PolicyRule,

    /// Per-namespace overrides
    #[serde(default)]
    pub namespaces: HashMap<String, PolicyRule>,

    /// Blocking retry bounds
    #[serde(default)]
    pub retry: RetryConfig,

    /// Counter store backend
    #[serde(default)]
    pub store: StoreKind,
}

/// A limit rule as written in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRule {
    /// Number of units allowed per window
    #[serde(default = "default_requests_per_unit")]
    pub requests_per_unit: u64,

    /// The window length as a named unit
    #[serde(default)]
    pub unit: TimeUnit,

    /// Explicit window length in milliseconds, overriding `unit`
    #[serde(default)]
    pub window_ms: Option<u64>,

    /// Deny everything under this rule
    #[serde(default)]
    pub blocked: bool,
}

impl Default for PolicyRule {
    fn default() -> Self {
        Self {
            requests_per_unit: default_requests_per_unit(),
            unit: TimeUnit::default(),
            window_ms: None,
            blocked: false,
        }
    }
}

fn default_requests_per_unit() -> u64 {
    DEFAULT_LIMIT
}

/// Time unit for rate limits (matches Envoy's configuration format).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    #[default]
    Second,
    Minute,
    Hour,
    Day,
}

impl From<TimeUnit> for TimeWindow {
    fn from(unit: TimeUnit) -> Self {
        match unit {
            TimeUnit::Second => TimeWindow::Second,
            TimeUnit::Minute => TimeWindow::Minute,
            TimeUnit::Hour => TimeWindow::Hour,
            TimeUnit::Day => TimeWindow::Day,
        }
    }
}

impl PolicyRule {
    pub fn window(&self) -> TimeWindow {
        match self.window_ms {
            Some(ms) => Duration::from_millis(ms).into(),
            None => self.unit.into(),
        }
    }

    /// Convert to a validated policy.
    pub fn to_policy(&self) -> Result<LimitPolicy> {
        if self.blocked {
            return Ok(LimitPolicy::blocked(self.window()));
        }
        LimitPolicy::new(self.requests_per_unit, self.window())
    }
}

/// Blocking retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Admission attempts, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Total wait budget in milliseconds
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            max_wait_ms: default_max_wait_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_max_wait_ms() -> u64 {
    DEFAULT_MAX_WAIT.as_millis() as u64
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        RetryPolicy {
            max_attempts: config.max_attempts,
            max_wait: Duration::from_millis(config.max_wait_ms),
        }
    }
}

/// Which in-process counter store to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// One mutex over all namespaces
    #[default]
    Memory,
    /// Per-shard locking
    Sharded,
}

impl StoreKind {
    pub fn build(&self) -> Arc<dyn CounterStore> {
        match self {
            StoreKind::Memory => Arc::new(MemoryStore::new()),
            StoreKind::Sharded => Arc::new(ShardedStore::new()),
        }
    }
}

impl ThrottlerConfig {
    /// Load configuration from a YAML file path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading throttler configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| ThrottleError::Config(format!("Failed to parse throttler config: {}", e)))
    }

    /// Load an optional YAML file layered under `THROTTLER__*` environment
    /// variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            info!(path = %path.display(), "Loading throttler configuration");
            builder = builder.add_source(
                ::config::File::from(path).format(::config::FileFormat::Yaml),
            );
        }

        let config = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Resolve every rule into a policy set.
    pub fn policy_set(&self) -> Result<PolicySet> {
        let default = self
            .default_policy
            .to_policy()
            .map_err(|e| with_context(e, "default policy"))?;

        let mut policies = PolicySet::new(default);
        for (namespace, rule) in &self.namespaces {
            let policy = rule
                .to_policy()
                .map_err(|e| with_context(e, &format!("namespace {:?}", namespace)))?;
            policies.insert(namespace.clone(), policy);
        }
        Ok(policies)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        (&self.retry).into()
    }

    /// Wire up a fixed-window throttler from this configuration.
    pub fn build_throttler(&self) -> Result<Throttler<FixedWindowProvider>> {
        let throttler = Throttler::from_policies(self.policy_set()?, Some(self.store.build()))
            .with_retry_policy(self.retry_policy());

        info!(
            store = ?self.store,
            overrides = self.namespaces.len(),
            "Throttler configured"
        );
        Ok(throttler)
    }
}

fn with_context(err: ThrottleError, context: &str) -> ThrottleError {
    match err {
        ThrottleError::MisconfiguredPolicy(msg) => {
            ThrottleError::MisconfiguredPolicy(format!("{}: {}", context, msg))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
default_policy:
  requests_per_unit: 100
  unit: minute
namespaces:
  premium:
    requests_per_unit: 10000
    unit: minute
  burst:
    requests_per_unit: 5
    window_ms: 250
  banned:
    blocked: true
retry:
  max_attempts: 3
  max_wait_ms: 5000
store: sharded
"#;
        let config = ThrottlerConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.store, StoreKind::Sharded);
        assert_eq!(config.namespaces.len(), 3);

        let policies = config.policy_set().unwrap();
        assert_eq!(policies.resolve("premium").limit(), 10_000);
        assert_eq!(policies.resolve("anyone").limit(), 100);
        assert_eq!(policies.resolve("anyone").window(), TimeWindow::Minute);
        assert_eq!(
            policies.resolve("burst").window(),
            TimeWindow::Custom(Duration::from_millis(250))
        );
        assert!(policies.resolve("banned").is_blocked());

        assert_eq!(
            config.retry_policy(),
            RetryPolicy {
                max_attempts: 3,
                max_wait: Duration::from_secs(5),
            }
        );
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = ThrottlerConfig::from_yaml("{}").unwrap();
        assert_eq!(config.store, StoreKind::Memory);
        assert_eq!(config.retry_policy(), RetryPolicy::default());

        let policies = config.policy_set().unwrap();
        assert_eq!(*policies.resolve("anything"), LimitPolicy::default());
    }

    #[test]
    fn test_zero_limit_without_blocked_is_rejected() {
        let yaml = r#"
namespaces:
  broken:
    requests_per_unit: 0
"#;
        let config = ThrottlerConfig::from_yaml(yaml).unwrap();
        let err = config.policy_set().unwrap_err();
        assert!(matches!(err, ThrottleError::MisconfiguredPolicy(_)));
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_zero_window_is_rejected() {
        let yaml = r#"
default_policy:
  requests_per_unit: 10
  window_ms: 0
"#;
        let config = ThrottlerConfig::from_yaml(yaml).unwrap();
        assert!(config.policy_set().is_err());
    }

    #[test]
    fn test_invalid_yaml() {
        let result = ThrottlerConfig::from_yaml("store: [not, a, store]");
        assert!(matches!(result, Err(ThrottleError::Config(_))));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!(
            "throttler-config-test-{}.yaml",
            std::process::id()
        ));
        std::fs::write(
            &path,
            "default_policy:\n  requests_per_unit: 7\n  unit: hour\nstore: sharded\n",
        )
        .unwrap();

        let loaded = ThrottlerConfig::load(Some(path.as_path())).unwrap();
        let from_file = ThrottlerConfig::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        for config in [loaded, from_file] {
            assert_eq!(config.store, StoreKind::Sharded);
            assert_eq!(config.default_policy.requests_per_unit, 7);
            assert_eq!(config.default_policy.unit, TimeUnit::Hour);
        }
    }

    #[test]
    fn test_missing_file() {
        let result = ThrottlerConfig::from_file("/nonexistent/throttler.yaml");
        assert!(matches!(result, Err(ThrottleError::Io(_))));
    }

    #[tokio::test]
    async fn test_build_throttler() {
        let yaml = r#"
default_policy:
  requests_per_unit: 2
  unit: hour
namespaces:
  banned:
    blocked: true
"#;
        let throttler = ThrottlerConfig::from_yaml(yaml)
            .unwrap()
            .build_throttler()
            .unwrap();

        assert!(!throttler.throttle("x", false, 1).await.unwrap());
        assert!(!throttler.throttle("x", false, 1).await.unwrap());
        assert!(throttler.throttle("x", false, 1).await.unwrap());
        assert!(throttler.throttle("banned", false, 1).await.unwrap());
    }

    #[test]
    fn test_time_unit_conversion() {
        assert_eq!(TimeWindow::from(TimeUnit::Second), TimeWindow::Second);
        assert_eq!(TimeWindow::from(TimeUnit::Minute), TimeWindow::Minute);
        assert_eq!(TimeWindow::from(TimeUnit::Hour), TimeWindow::Hour);
        assert_eq!(TimeWindow::from(TimeUnit::Day), TimeWindow::Day);
    }
}
