//! Non-blocking queue abstraction and the standard-library baseline.
//!
//! [`Queue`] is the surface both [`RingBuffer`] and [`ChannelQueue`] share,
//! so a benchmark or a caller can swap one for the other. `ChannelQueue`
//! wraps `std::sync::mpsc::sync_channel` and exists to be measured against.

use crate::RingBuffer;
use std::sync::mpsc::{self, Receiver, SyncSender, TryRecvError, TrySendError};

/// A bounded, non-blocking single-producer single-consumer queue.
pub trait Queue<T> {
    /// Appends `value`; returns `false` (dropping the value) when full.
    fn push(&self, value: T) -> bool;

    /// Removes the oldest value; returns `None` when empty.
    fn pop(&self) -> Option<T>;
}

impl<T> Queue<T> for RingBuffer<T> {
    #[inline]
    fn push(&self, value: T) -> bool {
        RingBuffer::push(self, value)
    }

    #[inline]
    fn pop(&self) -> Option<T> {
        RingBuffer::pop(self)
    }
}

// =============================================================================
// ChannelQueue
// =============================================================================

/// Bounded `std::sync::mpsc` channel behind the [`Queue`] interface.
///
/// `push` is `try_send`, `pop` is `try_recv`. Both halves live in one value,
/// which is `Send` but not `Sync` (the std receiver is not `Sync`): use it
/// from one thread, or split it with [`into_split`](Self::into_split) for a
/// producer/consumer pair.
///
/// ```
/// use ringguard::{ChannelQueue, Queue};
///
/// let q = ChannelQueue::new(2);
/// assert!(q.push(1));
/// assert!(q.push(2));
/// assert!(!q.push(3));
/// assert_eq!(q.pop(), Some(1));
/// ```
#[derive(Debug)]
pub struct ChannelQueue<T> {
    tx: SyncSender<T>,
    rx: Receiver<T>,
    capacity: usize,
}

impl<T> ChannelQueue<T> {
    /// Creates a channel buffering `capacity` values.
    ///
    /// A capacity of zero is treated as one: a zero-sized `sync_channel` is a
    /// rendezvous channel and `try_send` would never succeed without a
    /// blocked receiver. No power-of-two rounding.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::sync_channel(capacity);
        Self { tx, rx, capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Splits into the raw sender and receiver for cross-thread use.
    pub fn into_split(self) -> (SyncSender<T>, Receiver<T>) {
        (self.tx, self.rx)
    }
}

impl<T> Queue<T> for ChannelQueue<T> {
    #[inline]
    fn push(&self, value: T) -> bool {
        match self.tx.try_send(value) {
            Ok(()) => true,
            // The receiver lives in `self`, so Disconnected cannot happen here
            Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) => false,
        }
    }

    #[inline]
    fn pop(&self) -> Option<T> {
        match self.rx.try_recv() {
            Ok(value) => Some(value),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }
}
