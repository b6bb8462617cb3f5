//! Time sources for window accounting.
//!
//! Every timestamp handed to a counter store is milliseconds since the Unix
//! epoch, so records written by one process stay meaningful to another that
//! shares the same backend.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A source of wall-clock time in milliseconds.
pub trait Clock: Send + Sync + 'static {
    /// Current time in milliseconds since the Unix epoch.
    fn now_millis(&self) -> u64;
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        // Clamp pre-epoch clocks rather than wrapping.
        chrono::Utc::now().timestamp_millis().max(0) as u64
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same instant, so a test can keep one handle and give
/// another to the provider under test.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a manual clock frozen at `start_millis`.
    pub fn new(start_millis: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_millis)),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    /// Jump to an absolute instant.
    pub fn set(&self, millis: u64) {
        self.now.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// A clock driven by the tokio timer.
///
/// Follows paused/auto-advanced time in tests, which keeps the facade's
/// sleeps and the provider's window arithmetic on the same timeline.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    base: tokio::time::Instant,
    base_millis: u64,
}

impl TokioClock {
    /// Anchor a tokio clock at the current system time.
    pub fn new() -> Self {
        Self::starting_at(SystemClock.now_millis())
    }

    /// Anchor a tokio clock so that "now" reads as `base_millis`.
    pub fn starting_at(base_millis: u64) -> Self {
        Self {
            base: tokio::time::Instant::now(),
            base_millis,
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now_millis(&self) -> u64 {
        self.base_millis + self.base.elapsed().as_millis() as u64
    }
}
