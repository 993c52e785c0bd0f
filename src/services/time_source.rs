//! Time source abstraction for testability.
//!
//! Production code uses real system time; tests use a controllable logical
//! clock so the attribution windows (the 500 ms version-control window, the
//! growing panic-redaction window) can be exercised deterministically.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Abstraction over time-related operations.
pub trait TimeSource: Send + Sync + fmt::Debug {
    /// Get the current instant for measuring elapsed time.
    fn now(&self) -> Instant;

    /// Milliseconds since the Unix epoch, used to timestamp events.
    fn epoch_millis(&self) -> u64;

    /// Calculate elapsed time since an earlier instant.
    fn elapsed_since(&self, earlier: Instant) -> Duration {
        self.now().saturating_duration_since(earlier)
    }
}

/// Type alias for shared time source.
pub type SharedTimeSource = Arc<dyn TimeSource>;

/// Production implementation using actual system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealTimeSource;

impl RealTimeSource {
    pub fn new() -> Self {
        Self
    }

    pub fn shared() -> SharedTimeSource {
        Arc::new(Self)
    }
}

impl TimeSource for RealTimeSource {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn epoch_millis(&self) -> u64 {
        chrono::Utc::now().timestamp_millis().max(0) as u64
    }
}

/// Test implementation with controllable time.
///
/// `now()` and `epoch_millis()` both derive from a logical counter that only
/// moves when `advance()` is called, so tests run instantly while still
/// simulating time passage.
#[derive(Debug)]
pub struct TestTimeSource {
    /// Logical time in nanoseconds since creation.
    logical_nanos: AtomicU64,
    /// Base instant (real time at creation, used for Instant arithmetic).
    base_instant: Instant,
    /// Epoch milliseconds at logical time zero.
    base_epoch_millis: u64,
}

impl Default for TestTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TestTimeSource {
    /// Create a TestTimeSource whose epoch clock starts at a round number,
    /// keeping timestamps in assertions readable.
    pub fn new() -> Self {
        Self {
            logical_nanos: AtomicU64::new(0),
            base_instant: Instant::now(),
            base_epoch_millis: 1_000_000,
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Advance logical time by the given duration.
    pub fn advance(&self, duration: Duration) {
        self.logical_nanos
            .fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);
    }

    /// Get the logical elapsed time since creation.
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.logical_nanos.load(Ordering::SeqCst))
    }
}

impl TimeSource for TestTimeSource {
    fn now(&self) -> Instant {
        self.base_instant + self.elapsed()
    }

    fn epoch_millis(&self) -> u64 {
        self.base_epoch_millis + self.elapsed().as_millis() as u64
    }
}
