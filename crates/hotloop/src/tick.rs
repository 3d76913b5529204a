//! Periodic triggers for hot loops.
//!
//! A [`Ticker`] answers "has the interval elapsed?" without blocking, so a
//! loop can do periodic work (flush stats, check a deadline) between
//! `push`/`pop` calls:
//!
//! ```
//! use hotloop::{AtomicTicker, Ticker};
//! use ringguard::RingBuffer;
//! use std::time::Duration;
//!
//! let ring = RingBuffer::<u32>::new(64);
//! let ticker = AtomicTicker::new(Duration::from_millis(100));
//! let mut reports = 0;
//!
//! for i in 0..1000 {
//!     if ticker.tick() {
//!         reports += 1;
//!     }
//!     ring.push(i);
//!     ring.pop();
//! }
//! # let _ = reports;
//! ```

use crate::clock::{interval_nanos, Clock, MonotonicClock};
use crate::HotLoopError;
use std::cell::Cell;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender, TrySendError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Signals when a time interval has elapsed.
pub trait Ticker {
    /// Returns `true` if the interval has elapsed since the last tick (or
    /// since construction / [`reset`](Self::reset)). Never blocks.
    fn tick(&self) -> bool;

    /// Starts a new interval from now.
    fn reset(&self);

    /// The configured interval.
    fn interval(&self) -> Duration;
}

// =============================================================================
// AtomicTicker
// =============================================================================

/// Lock-free ticker: one clock read, one load, and a CAS only when due.
///
/// Safe to poll from several threads. When the interval elapses, the poller
/// whose compare-and-swap moves `last_tick` forward fires; the others see
/// the new value and do not.
#[derive(Debug)]
pub struct AtomicTicker<C = MonotonicClock> {
    clock: C,
    interval_nanos: i64,
    last_tick: AtomicI64,
}

impl AtomicTicker {
    /// Creates a ticker on the default [`MonotonicClock`].
    ///
    /// # Panics
    ///
    /// Panics if `interval` is zero or does not fit in `i64` nanoseconds; use
    /// [`try_new`](Self::try_new) to handle those as errors.
    pub fn new(interval: Duration) -> Self {
        match Self::try_new(interval) {
            Ok(ticker) => ticker,
            Err(e) => panic!("invalid tick interval {:?}: {}", interval, e),
        }
    }

    pub fn try_new(interval: Duration) -> Result<Self, HotLoopError> {
        Self::with_clock(interval, MonotonicClock::new())
    }
}

impl<C: Clock> AtomicTicker<C> {
    /// Creates a ticker reading `clock`.
    pub fn with_clock(interval: Duration, clock: C) -> Result<Self, HotLoopError> {
        let interval_nanos = interval_nanos(interval)?;
        let now = clock.now_nanos();
        Ok(Self {
            clock,
            interval_nanos,
            last_tick: AtomicI64::new(now),
        })
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}

impl<C: Clock> Ticker for AtomicTicker<C> {
    #[inline]
    fn tick(&self) -> bool {
        let now = self.clock.now_nanos();
        // The timestamp guards no other data: Relaxed throughout
        let last = self.last_tick.load(Ordering::Relaxed);

        now - last >= self.interval_nanos
            && self
                .last_tick
                .compare_exchange(last, now, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
    }

    fn reset(&self) {
        self.last_tick
            .store(self.clock.now_nanos(), Ordering::Relaxed);
    }

    fn interval(&self) -> Duration {
        Duration::from_nanos(self.interval_nanos as u64)
    }
}

// =============================================================================
// BatchTicker
// =============================================================================

/// Ticker that reads the clock only on every `every`-th call.
///
/// The other calls cost one increment and a compare. Timing precision drops
/// accordingly: a tick can fire up to `every - 1` calls late. Single-thread
/// only (`!Sync`).
#[derive(Debug)]
pub struct BatchTicker<C = MonotonicClock> {
    clock: C,
    interval_nanos: i64,
    every: u64,
    count: Cell<u64>,
    last_tick: Cell<i64>,
}

impl BatchTicker {
    /// Creates a batch ticker on the default [`MonotonicClock`]. An `every`
    /// of zero is treated as one.
    ///
    /// # Panics
    ///
    /// Panics if `interval` is zero or does not fit in `i64` nanoseconds; use
    /// [`try_new`](Self::try_new) to handle those as errors.
    pub fn new(interval: Duration, every: u64) -> Self {
        match Self::try_new(interval, every) {
            Ok(ticker) => ticker,
            Err(e) => panic!("invalid tick interval {:?}: {}", interval, e),
        }
    }

    pub fn try_new(interval: Duration, every: u64) -> Result<Self, HotLoopError> {
        Self::with_clock(interval, every, MonotonicClock::new())
    }
}

impl<C: Clock> BatchTicker<C> {
    pub fn with_clock(interval: Duration, every: u64, clock: C) -> Result<Self, HotLoopError> {
        let interval_nanos = interval_nanos(interval)?;
        let now = clock.now_nanos();
        Ok(Self {
            clock,
            interval_nanos,
            every: every.max(1),
            count: Cell::new(0),
            last_tick: Cell::new(now),
        })
    }

    /// Calls between clock reads.
    pub fn every(&self) -> u64 {
        self.every
    }
}

impl<C: Clock> Ticker for BatchTicker<C> {
    #[inline]
    fn tick(&self) -> bool {
        let count = self.count.get() + 1;
        self.count.set(count);
        if count % self.every != 0 {
            return false;
        }

        let now = self.clock.now_nanos();
        if now - self.last_tick.get() >= self.interval_nanos {
            self.last_tick.set(now);
            return true;
        }
        false
    }

    fn reset(&self) {
        self.count.set(0);
        self.last_tick.set(self.clock.now_nanos());
    }

    fn interval(&self) -> Duration {
        Duration::from_nanos(self.interval_nanos as u64)
    }
}

// =============================================================================
// StdTicker
// =============================================================================

/// Ticker driven by a background timer thread: the conventional std design,
/// kept as the baseline the clock-reading tickers are measured against.
///
/// The timer thread sends on a one-slot channel every `interval`; `tick()`
/// is a `try_recv`. Like any channel-fed timer it drops ticks nobody
/// collected, so a slow poller sees at most one pending tick. Dropping the
/// ticker stops and joins the thread.
#[derive(Debug)]
pub struct StdTicker {
    interval: Duration,
    ticks: Receiver<()>,
    /// Each message restarts the timer; disconnecting stops it
    control: Option<Sender<()>>,
    timer: Option<JoinHandle<()>>,
}

impl StdTicker {
    /// Starts the timer thread.
    ///
    /// # Panics
    ///
    /// Panics on an invalid interval or if the thread cannot be spawned; use
    /// [`try_new`](Self::try_new) to handle those as errors.
    pub fn new(interval: Duration) -> Self {
        match Self::try_new(interval) {
            Ok(ticker) => ticker,
            Err(e) => panic!("cannot start StdTicker with interval {:?}: {}", interval, e),
        }
    }

    pub fn try_new(interval: Duration) -> Result<Self, HotLoopError> {
        interval_nanos(interval)?;

        let (tick_tx, ticks) = mpsc::sync_channel(1);
        let (control, control_rx) = mpsc::channel();
        let timer = thread::Builder::new()
            .name("hotloop-ticker".into())
            .spawn(move || run_timer(interval, &tick_tx, &control_rx))
            .map_err(|e| HotLoopError::TimerSpawn { kind: e.kind() })?;

        Ok(Self {
            interval,
            ticks,
            control: Some(control),
            timer: Some(timer),
        })
    }
}

fn run_timer(interval: Duration, ticks: &SyncSender<()>, control: &Receiver<()>) {
    loop {
        match control.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {
                // Full means an uncollected tick is already pending
                if let Err(TrySendError::Disconnected(())) = ticks.try_send(()) {
                    return;
                }
            }
            Ok(()) => {}
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}

impl Ticker for StdTicker {
    #[inline]
    fn tick(&self) -> bool {
        self.ticks.try_recv().is_ok()
    }

    /// Restarts the timer and discards a pending tick. A tick the timer sends
    /// while the reset is in flight may still be delivered.
    fn reset(&self) {
        if let Some(control) = &self.control {
            let _ = control.send(());
        }
        while self.ticks.try_recv().is_ok() {}
    }

    fn interval(&self) -> Duration {
        self.interval
    }
}

impl Drop for StdTicker {
    fn drop(&mut self) {
        // Disconnecting wakes the timer out of recv_timeout
        drop(self.control.take());
        if let Some(timer) = self.timer.take() {
            let _ = timer.join();
        }
    }
}
