//! CPU time-stamp counter (TSC) clock and ticker.
//!
//! Reading the counter skips the OS entirely, which makes it the cheapest
//! timestamp on `x86_64`. The price is calibration: the counter runs in
//! cycles, and the cycles-per-nanosecond ratio can drift with frequency
//! scaling, power states and thermal throttling. Calibrate once on a warm CPU
//! and reuse the ratio.
//!
//! On every other architecture the types still exist so callers compile, but
//! their constructors return [`HotLoopError::TscUnsupported`].

use crate::HotLoopError;
use std::time::Duration;

#[cfg(target_arch = "x86_64")]
use crate::{clock::interval_nanos, Clock, Ticker};
#[cfg(target_arch = "x86_64")]
use std::sync::atomic::{AtomicU64, Ordering};
#[cfg(target_arch = "x86_64")]
use std::time::Instant;
#[cfg(target_arch = "x86_64")]
use tracing::debug;

#[cfg(not(target_arch = "x86_64"))]
use crate::{Clock, Ticker};
#[cfg(not(target_arch = "x86_64"))]
use std::convert::Infallible;

/// Calibration window used by the `calibrated` constructors.
pub const DEFAULT_CALIBRATION_WINDOW: Duration = Duration::from_millis(10);

#[cfg(target_arch = "x86_64")]
#[inline]
#[allow(unused_unsafe)]
fn read_tsc() -> u64 {
    // SAFETY: rdtsc exists on every x86_64 CPU and has no memory effects.
    unsafe {
        core::arch::x86_64::_rdtsc()
    }
}

#[cfg(target_arch = "x86_64")]
fn checked_ratio(cycles_per_ns: f64) -> Result<f64, HotLoopError> {
    if cycles_per_ns.is_finite() && cycles_per_ns > 0.0 {
        Ok(cycles_per_ns)
    } else {
        Err(HotLoopError::InvalidRatio)
    }
}

/// Measures counter cycles per nanosecond over a sleep of `window`.
///
/// Blocks for roughly `window`.
#[cfg(target_arch = "x86_64")]
pub fn calibrate_tsc(window: Duration) -> Result<f64, HotLoopError> {
    // Warm up the read path
    read_tsc();
    read_tsc();

    let start = read_tsc();
    let began = Instant::now();
    std::thread::sleep(window);
    let end = read_tsc();
    let nanos = began.elapsed().as_nanos() as u64;

    let cycles = end.wrapping_sub(start);
    if cycles == 0 || nanos == 0 {
        return Err(HotLoopError::CalibrationFailed { cycles, nanos });
    }

    let ratio = cycles as f64 / nanos as f64;
    debug!(cycles, nanos, cycles_per_ns = ratio, "calibrated TSC");
    Ok(ratio)
}

/// Always fails: the cycle counter is `x86_64`-only.
#[cfg(not(target_arch = "x86_64"))]
pub fn calibrate_tsc(window: Duration) -> Result<f64, HotLoopError> {
    let _ = window;
    Err(HotLoopError::TscUnsupported)
}

// =============================================================================
// TscClock
// =============================================================================

/// [`Clock`] backed by the time-stamp counter.
#[cfg(target_arch = "x86_64")]
#[derive(Debug, Clone, Copy)]
pub struct TscClock {
    origin: u64,
    cycles_per_ns: f64,
}

#[cfg(target_arch = "x86_64")]
impl TscClock {
    /// Creates a clock from a known cycles-per-nanosecond ratio (e.g. `3.0`
    /// for a 3 GHz invariant TSC).
    pub fn new(cycles_per_ns: f64) -> Result<Self, HotLoopError> {
        Ok(Self {
            origin: read_tsc(),
            cycles_per_ns: checked_ratio(cycles_per_ns)?,
        })
    }

    /// Calibrates over [`DEFAULT_CALIBRATION_WINDOW`], then creates the clock.
    pub fn calibrated() -> Result<Self, HotLoopError> {
        Self::new(calibrate_tsc(DEFAULT_CALIBRATION_WINDOW)?)
    }

    pub fn cycles_per_ns(&self) -> f64 {
        self.cycles_per_ns
    }
}

#[cfg(target_arch = "x86_64")]
impl Clock for TscClock {
    #[inline]
    fn now_nanos(&self) -> i64 {
        (read_tsc().wrapping_sub(self.origin) as f64 / self.cycles_per_ns) as i64
    }
}

/// [`Clock`] backed by the time-stamp counter. Unavailable on this target.
#[cfg(not(target_arch = "x86_64"))]
#[derive(Debug, Clone, Copy)]
pub struct TscClock {
    never: Infallible,
}

#[cfg(not(target_arch = "x86_64"))]
impl TscClock {
    pub fn new(cycles_per_ns: f64) -> Result<Self, HotLoopError> {
        let _ = cycles_per_ns;
        Err(HotLoopError::TscUnsupported)
    }

    pub fn calibrated() -> Result<Self, HotLoopError> {
        Err(HotLoopError::TscUnsupported)
    }

    pub fn cycles_per_ns(&self) -> f64 {
        match self.never {}
    }
}

#[cfg(not(target_arch = "x86_64"))]
impl Clock for TscClock {
    fn now_nanos(&self) -> i64 {
        match self.never {}
    }
}

// =============================================================================
// TscTicker
// =============================================================================

/// Ticker comparing raw counter deltas, with no conversion on the hot path.
///
/// Same firing rule as [`AtomicTicker`](crate::AtomicTicker): the first
/// poller to see the interval elapsed wins a compare-and-swap and fires.
#[cfg(target_arch = "x86_64")]
#[derive(Debug)]
pub struct TscTicker {
    interval: Duration,
    interval_cycles: u64,
    cycles_per_ns: f64,
    last_tick: AtomicU64,
}

#[cfg(target_arch = "x86_64")]
impl TscTicker {
    /// Creates a ticker from a known cycles-per-nanosecond ratio.
    pub fn new(interval: Duration, cycles_per_ns: f64) -> Result<Self, HotLoopError> {
        let nanos = interval_nanos(interval)?;
        let cycles_per_ns = checked_ratio(cycles_per_ns)?;
        Ok(Self {
            interval,
            interval_cycles: ((nanos as f64 * cycles_per_ns) as u64).max(1),
            cycles_per_ns,
            last_tick: AtomicU64::new(read_tsc()),
        })
    }

    /// Calibrates over [`DEFAULT_CALIBRATION_WINDOW`] (blocking), then
    /// creates the ticker.
    pub fn calibrated(interval: Duration) -> Result<Self, HotLoopError> {
        // Reject a bad interval before paying for calibration
        interval_nanos(interval)?;
        Self::new(interval, calibrate_tsc(DEFAULT_CALIBRATION_WINDOW)?)
    }

    pub fn cycles_per_ns(&self) -> f64 {
        self.cycles_per_ns
    }
}

#[cfg(target_arch = "x86_64")]
impl Ticker for TscTicker {
    #[inline]
    fn tick(&self) -> bool {
        let now = read_tsc();
        // The timestamp guards no other data: Relaxed throughout
        let last = self.last_tick.load(Ordering::Relaxed);

        now.wrapping_sub(last) >= self.interval_cycles
            && self
                .last_tick
                .compare_exchange(last, now, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
    }

    fn reset(&self) {
        self.last_tick.store(read_tsc(), Ordering::Relaxed);
    }

    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Ticker comparing raw counter deltas. Unavailable on this target.
#[cfg(not(target_arch = "x86_64"))]
#[derive(Debug)]
pub struct TscTicker {
    never: Infallible,
}

#[cfg(not(target_arch = "x86_64"))]
impl TscTicker {
    pub fn new(interval: Duration, cycles_per_ns: f64) -> Result<Self, HotLoopError> {
        let _ = (interval, cycles_per_ns);
        Err(HotLoopError::TscUnsupported)
    }

    pub fn calibrated(interval: Duration) -> Result<Self, HotLoopError> {
        let _ = interval;
        Err(HotLoopError::TscUnsupported)
    }

    pub fn cycles_per_ns(&self) -> f64 {
        match self.never {}
    }
}

#[cfg(not(target_arch = "x86_64"))]
impl Ticker for TscTicker {
    fn tick(&self) -> bool {
        match self.never {}
    }

    fn reset(&self) {
        match self.never {}
    }

    fn interval(&self) -> Duration {
        match self.never {}
    }
}
