//! ringguard - Lock-Free Single-Producer Single-Consumer Ring Buffer
//!
//! A fixed-capacity SPSC queue with a runtime contract guard. One thread
//! pushes, one thread pops; neither ever blocks or allocates after
//! construction.
//!
//! # Key Features
//!
//! - Power-of-two storage indexed by unbounded `u64` cursors
//! - Release/Acquire cursor publication (the whole synchronization story)
//! - Cache-padded cursors to avoid false sharing between the two threads
//! - Best-effort detection of a second producer or consumer (`spsc-guard`)
//! - A [`Queue`] trait shared with [`ChannelQueue`], the `std::sync::mpsc`
//!   baseline the ring is benchmarked against
//!
//! # Example
//!
//! ```
//! use ringguard::RingBuffer;
//!
//! let ring = RingBuffer::<u64>::new(5);
//! assert_eq!(ring.capacity(), 8); // rounded up
//!
//! assert!(ring.push(42));
//! assert_eq!(ring.pop(), Some(42));
//! assert_eq!(ring.pop(), None);
//! ```
//!
//! # Features
//!
//! - `spsc-guard` (default): panic on overlapping calls into one role
//! - `tracing`: emit `tracing` events and enable [`init_tracing`]
//! - `loom`: run the ring on loom's model-checked primitives

mod guard;
mod invariants;
mod queue;
mod ring;
mod sync;
mod trace;

/// Adaptive spin → yield backoff for callers retrying a full `push` or an
/// empty `pop`. The ring itself never waits.
pub use crossbeam_utils::Backoff;
pub use queue::{ChannelQueue, Queue};
pub use ring::{RingBuffer, DEFAULT_CAPACITY};
pub use trace::init_tracing;
