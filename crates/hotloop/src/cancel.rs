//! Cooperative cancellation for hot loops.
//!
//! [`AtomicCanceler`] is the one to poll from a hot loop. [`ChannelCanceler`]
//! signals through a closed `std::sync::mpsc` channel, the conventional std
//! way, and is kept as the baseline the atomic flag is benchmarked against.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A cancellation flag a hot loop polls once per iteration.
pub trait Canceler {
    /// Returns `true` once cancellation has been requested. Never blocks.
    fn is_cancelled(&self) -> bool;

    /// Requests cancellation. Idempotent.
    fn cancel(&self);
}

/// [`Canceler`] backed by one atomic flag.
///
/// `cancel` is a Release store and `is_cancelled` an Acquire load, so writes
/// made before cancelling are visible to a loop that observes the flag.
///
/// ```
/// use hotloop::{AtomicCanceler, Canceler};
/// use std::sync::Arc;
///
/// let cancel = Arc::new(AtomicCanceler::new());
/// let worker = {
///     let cancel = Arc::clone(&cancel);
///     std::thread::spawn(move || {
///         let mut spins = 0u64;
///         while !cancel.is_cancelled() {
///             spins += 1;
///             std::hint::spin_loop();
///         }
///         spins
///     })
/// };
///
/// cancel.cancel();
/// worker.join().unwrap();
/// ```
#[derive(Debug, Default)]
pub struct AtomicCanceler {
    cancelled: AtomicBool,
}

impl AtomicCanceler {
    pub const fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
        }
    }

    /// Clears the flag so the canceler can drive another run.
    ///
    /// Only call this when no loop is polling, otherwise that loop may miss
    /// the earlier cancellation.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::Release);
    }
}

impl Canceler for AtomicCanceler {
    #[inline]
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    #[inline]
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

// =============================================================================
// ChannelCanceler
// =============================================================================

/// [`Canceler`] signalled by disconnecting an `mpsc` channel.
///
/// `cancel` drops the only sender; `is_cancelled` takes the receiver's lock
/// and checks `try_recv` for `Disconnected`. Every poll pays a mutex and a
/// `try_recv`, which is what this type is here to measure.
#[derive(Debug)]
pub struct ChannelCanceler {
    tx: Mutex<Option<Sender<()>>>,
    rx: Mutex<Receiver<()>>,
}

impl ChannelCanceler {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            tx: Mutex::new(Some(tx)),
            rx: Mutex::new(rx),
        }
    }
}

impl Default for ChannelCanceler {
    fn default() -> Self {
        Self::new()
    }
}

// A panic while holding either lock cannot leave the channel half-updated
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Canceler for ChannelCanceler {
    fn is_cancelled(&self) -> bool {
        matches!(lock(&self.rx).try_recv(), Err(TryRecvError::Disconnected))
    }

    fn cancel(&self) {
        drop(lock(&self.tx).take());
    }
}
