//! Monotonic timestamp sources.
//!
//! Tickers are generic over [`Clock`], so the clock is chosen at compile time
//! and `now_nanos` inlines into the hot loop. [`MonotonicClock`] works
//! everywhere; [`TscClock`](crate::TscClock) is the faster `x86_64`
//! option.

use crate::HotLoopError;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A fast monotonic timestamp in nanoseconds.
///
/// Only differences between two readings of the same clock are meaningful;
/// the origin is implementation-defined.
pub trait Clock: Send + Sync {
    /// Nanoseconds since the clock's origin. Never decreases.
    fn now_nanos(&self) -> i64;
}

impl<C: Clock + ?Sized> Clock for &C {
    #[inline]
    fn now_nanos(&self) -> i64 {
        (**self).now_nanos()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    #[inline]
    fn now_nanos(&self) -> i64 {
        (**self).now_nanos()
    }
}

/// `std::time::Instant`, measured from the moment the clock was created.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now_nanos(&self) -> i64 {
        // i64 nanoseconds cover ~292 years of uptime
        self.origin.elapsed().as_nanos() as i64
    }
}

/// A clock that only moves when told to. Meant for tests and simulations.
///
/// ```
/// use hotloop::{AtomicTicker, Clock, ManualClock, Ticker};
/// use std::time::Duration;
///
/// let clock = ManualClock::new();
/// let ticker = AtomicTicker::with_clock(Duration::from_millis(10), &clock).unwrap();
///
/// assert!(!ticker.tick());
/// clock.advance(Duration::from_millis(10));
/// assert!(ticker.tick());
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the clock forward by `by`.
    ///
    /// # Panics
    ///
    /// Panics if the reading would pass `i64::MAX` nanoseconds.
    pub fn advance(&self, by: Duration) {
        let Ok(delta) = i64::try_from(by.as_nanos()) else {
            panic!("ManualClock overflow: cannot advance by {:?}", by);
        };
        if let Err(now) = self
            .now
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |now| now.checked_add(delta))
        {
            panic!("ManualClock overflow: {}ns + {:?}", now, by);
        }
    }

    /// Sets the absolute reading. Must not go backwards.
    pub fn set_nanos(&self, nanos: i64) {
        let prev = self.now.swap(nanos, Ordering::SeqCst);
        debug_assert!(nanos >= prev, "ManualClock moved backwards: {} -> {}", prev, nanos);
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now_nanos(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Converts a tick interval to positive nanoseconds.
pub(crate) fn interval_nanos(interval: Duration) -> Result<i64, HotLoopError> {
    if interval.is_zero() {
        return Err(HotLoopError::ZeroInterval);
    }
    i64::try_from(interval.as_nanos()).map_err(|_| HotLoopError::IntervalTooLarge {
        secs: interval.as_secs(),
    })
}
