//! Time units for expressing a limit as a rate.

use serde::{Deserialize, Serialize};

/// The time unit a ratio is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatioFactor {
    /// Units per second
    #[default]
    PerSecond,
    /// Units per minute
    PerMinute,
    /// Units per hour
    PerHour,
    /// Units per day
    PerDay,
}

impl RatioFactor {
    /// Length of the unit in seconds.
    pub fn seconds(&self) -> u64 {
        match self {
            RatioFactor::PerSecond => 1,
            RatioFactor::PerMinute => 60,
            RatioFactor::PerHour => 3600,
            RatioFactor::PerDay => 86400,
        }
    }

    /// Express `limit` units per `window_ms` as units per this factor.
    pub fn ratio(&self, limit: u64, window_ms: u64) -> f64 {
        if window_ms == 0 {
            return 0.0;
        }
        limit as f64 * (self.seconds() * 1000) as f64 / window_ms as f64
    }
}
