//! Limit policies and their per-namespace resolution.

use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, ThrottleError};

/// Default limit when no specific policy is configured.
pub const DEFAULT_LIMIT: u64 = 1000;
/// Default time window when no specific window is configured.
pub const DEFAULT_WINDOW: TimeWindow = TimeWindow::Second;

/// Time window over which usage accumulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeWindow {
    /// Per-second rate limiting
    Second,
    /// Per-minute rate limiting
    Minute,
    /// Per-hour rate limiting
    Hour,
    /// Per-day rate limiting
    Day,
    /// Any other window length
    Custom(Duration),
}

impl TimeWindow {
    /// Get the duration of this time window.
    pub fn duration(&self) -> Duration {
        match self {
            TimeWindow::Second => Duration::from_secs(1),
            TimeWindow::Minute => Duration::from_secs(60),
            TimeWindow::Hour => Duration::from_secs(3600),
            TimeWindow::Day => Duration::from_secs(86400),
            TimeWindow::Custom(duration) => *duration,
        }
    }

    /// Window length in whole milliseconds.
    pub fn millis(&self) -> u64 {
        self.duration().as_millis() as u64
    }
}

impl From<Duration> for TimeWindow {
    fn from(duration: Duration) -> Self {
        match duration.as_millis() {
            1_000 => TimeWindow::Second,
            60_000 => TimeWindow::Minute,
            3_600_000 => TimeWindow::Hour,
            86_400_000 => TimeWindow::Day,
            _ => TimeWindow::Custom(duration),
        }
    }
}

/// Maximum units per window for a namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitPolicy {
    limit: u64,
    window: TimeWindow,
}

impl LimitPolicy {
    /// Create a policy admitting `limit` units per `window`.
    ///
    /// A zero limit or a window shorter than one millisecond is rejected; use
    /// [`LimitPolicy::blocked`] for a namespace that should never be admitted.
    pub fn new(limit: u64, window: impl Into<TimeWindow>) -> Result<Self> {
        let window = window.into();

        if limit == 0 {
            return Err(ThrottleError::MisconfiguredPolicy(
                "limit must be positive (declare the policy as blocked to deny everything)"
                    .to_string(),
            ));
        }
        if window.millis() == 0 {
            return Err(ThrottleError::MisconfiguredPolicy(format!(
                "window must be at least 1ms, got {:?}",
                window.duration()
            )));
        }

        Ok(Self { limit, window })
    }

    /// A policy that is permanently saturated.
    ///
    /// The window still drives the wait estimate reported to callers.
    pub fn blocked(window: impl Into<TimeWindow>) -> Self {
        Self {
            limit: 0,
            window: window.into(),
        }
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn window(&self) -> TimeWindow {
        self.window
    }

    /// Whether nothing is ever admitted under this policy.
    pub fn is_blocked(&self) -> bool {
        self.limit == 0
    }
}

impl Default for LimitPolicy {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            window: DEFAULT_WINDOW,
        }
    }
}

/// A default policy plus per-namespace overrides.
///
/// Policies are fixed once the set is handed to a provider.
#[derive(Debug, Clone, Default)]
pub struct PolicySet {
    default: LimitPolicy,
    overrides: HashMap<String, LimitPolicy>,
}

impl PolicySet {
    /// Create a set where every namespace uses `default`.
    pub fn new(default: LimitPolicy) -> Self {
        Self {
            default,
            overrides: HashMap::new(),
        }
    }

    /// Attach a dedicated policy to one namespace.
    pub fn with_override(mut self, namespace: impl Into<String>, policy: LimitPolicy) -> Self {
        self.insert(namespace, policy);
        self
    }

    pub fn insert(&mut self, namespace: impl Into<String>, policy: LimitPolicy) {
        let namespace = namespace.into();
        debug!(
            namespace = %namespace,
            limit = policy.limit(),
            window = ?policy.window(),
            "Registering namespace policy"
        );
        self.overrides.insert(namespace, policy);
    }

    /// Policy for a namespace, falling back to the default.
    pub fn resolve(&self, namespace: &str) -> &LimitPolicy {
        self.overrides.get(namespace).unwrap_or(&self.default)
    }
}
