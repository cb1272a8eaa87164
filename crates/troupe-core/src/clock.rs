//! Clock abstraction
//!
//! All code that needs current time or sleep goes through [`Clock`], never
//! through `SystemTime::now()` or `tokio::time::sleep` directly. This keeps
//! the restart window and the scheduler testable with a manually-advanced
//! clock.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

/// Time backend for the stage
///
/// # Implementations
///
/// - [`WallClock`]: production, system clock and real sleeps
/// - [`ManualClock`]: tests, manually advanced, sleeps return immediately
#[async_trait]
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current time in milliseconds since epoch
    fn now_ms(&self) -> u64;

    /// Sleep for the given duration
    async fn sleep(&self, duration: Duration);
}

/// Production clock using the system wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct WallClock;

impl WallClock {
    /// Create a new wall clock
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Clock for WallClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Manually-advanced clock for tests
///
/// `sleep` advances the clock by the requested duration and returns
/// immediately, so timed code runs without real delays.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicU64,
}

impl ManualClock {
    /// Create a manual clock at time zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a manual clock at the given time
    pub fn starting_at(now_ms: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(now_ms),
        }
    }

    /// Advance the clock by the given number of milliseconds
    pub fn advance_ms(&self, ms: u64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }

    async fn sleep(&self, duration: Duration) {
        self.advance_ms(duration.as_millis() as u64);
    }
}
