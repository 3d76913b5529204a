//! Cheap per-iteration checks for loops that spin on a `ringguard` ring.
//!
//! A producer or consumer loop around [`ringguard::RingBuffer`] runs millions
//! of iterations per second and can't afford a syscall or a lock on each one.
//! This crate provides the two checks such a loop usually needs:
//!
//! - **Cancellation**: [`AtomicCanceler`], one atomic load per poll.
//! - **Periodic work**: [`AtomicTicker`], [`BatchTicker`] and [`TscTicker`],
//!   each answering "has the interval elapsed?" at a different cost/precision
//!   point.
//!
//! # Example
//!
//! ```
//! use hotloop::{AtomicCanceler, AtomicTicker, Canceler, Ticker};
//! use ringguard::RingBuffer;
//! use std::time::Duration;
//!
//! let ring = RingBuffer::<u64>::new(256);
//! let cancel = AtomicCanceler::new();
//! let ticker = AtomicTicker::new(Duration::from_millis(50));
//!
//! let mut moved = 0u64;
//! while !cancel.is_cancelled() {
//!     if ticker.tick() {
//!         println!("moved {} so far", moved);
//!     }
//!     if ring.push(moved) {
//!         assert_eq!(ring.pop(), Some(moved));
//!         moved += 1;
//!     }
//!     if moved == 10_000 {
//!         cancel.cancel();
//!     }
//! }
//! ```
//!
//! # Choosing a ticker
//!
//! | Ticker | Cost per `tick()` | Shareable | Notes |
//! |--------|-------------------|-----------|-------|
//! | [`AtomicTicker`] | clock read + load | yes | generic over [`Clock`] |
//! | [`BatchTicker`] | increment, clock read every N | no | fires up to N-1 calls late |
//! | [`TscTicker`] | `rdtsc` + load | yes | `x86_64` only, needs calibration |
//! | [`StdTicker`] | channel `try_recv` | no | timer thread; baseline |
//!
//! # Baselines
//!
//! [`ChannelCanceler`] and [`StdTicker`] are the conventional std designs (a
//! closed channel, a timer thread feeding a channel). They implement the same
//! traits so the benches and the demo can put them side by side with the
//! atomic versions; don't use them in a hot loop.
//!
//! The `demo` feature builds the `demo` binary, which runs both side by side
//! with `--compare`.

mod cancel;
mod clock;
mod error;
mod tick;
mod tsc;

pub use cancel::{AtomicCanceler, Canceler, ChannelCanceler};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use error::HotLoopError;
pub use tick::{AtomicTicker, BatchTicker, StdTicker, Ticker};
pub use tsc::{calibrate_tsc, TscClock, TscTicker, DEFAULT_CALIBRATION_WINDOW};
