//! # The Time Boundary
//!
//! The ledger never measures time itself. Every operation that stamps a
//! checkpoint or evaluates the unhealthy grace window reads the current
//! instant from an injected [`Clock`], so the single time-based gate in the
//! protocol (24 hours after unvouching) is decided against a clock the
//! embedding system controls -- and tests can pin to the second.
//!
//! Production code uses [`SystemClock`]; tests use [`ManualClock`] and
//! advance it explicitly.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::sync::Arc;

/// Source of the current instant for the ledger core.
///
/// Implementations must be monotonic from the ledger's point of view:
/// successive `now()` calls observed by the registry never go backwards.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time. The default for production use.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A hand-driven clock for tests.
///
/// Cloning shares the underlying instant, so a test can keep one handle and
/// hand another to the registry.
#[derive(Clone, Debug)]
pub struct ManualClock {
    instant: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    /// Creates a manual clock starting at the given instant.
    pub fn starting_at(instant: DateTime<Utc>) -> Self {
        Self {
            instant: Arc::new(Mutex::new(instant)),
        }
    }

    /// Sets the clock to an absolute instant.
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.instant.lock() = instant;
    }

    /// Advances the clock by the given duration.
    pub fn advance(&self, by: Duration) {
        let mut guard = self.instant.lock();
        *guard = *guard + by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.instant.lock()
    }
}
