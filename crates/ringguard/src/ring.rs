use crate::guard::{Role, RoleClaim};
use crate::invariants::{
    debug_assert_bounded_count, debug_assert_cursor_order, debug_assert_readable,
};
use crate::sync::{AtomicU64, Ordering, UnsafeCell};
use crate::trace::debug;
use crossbeam_utils::CachePadded;
use std::fmt;
use std::mem::MaybeUninit;

// =============================================================================
// MEMORY ORDERING & SYNCHRONIZATION STRATEGY
// =============================================================================
//
// ## Cursors
//
// `head` and `tail` are unbounded u64 counters, never wrapped indices. The
// slot for logical position `i` is `storage[i & mask]`. At 10 billion
// operations per second the counters take ~58 years to wrap.
//
// ## Producer (push)
// 1. Claim the push role (guard, see guard.rs)
// 2. Load `head` with Relaxed (only the producer writes head)
// 3. Load `tail` with Acquire (synchronizes with the consumer's Release, so
//    the slot it freed is really free)
// 4. Full if `head - tail >= capacity`
// 5. Write the value into `storage[head & mask]`
// 6. Store `head + 1` with Release (publishes the slot write)
//
// ## Consumer (pop)
// 1. Claim the pop role
// 2. Load `tail` with Relaxed (only the consumer writes tail)
// 3. Load `head` with Acquire (synchronizes with the producer's Release, so
//    the slot write is visible)
// 4. Empty if `tail == head`
// 5. Move the value out of `storage[tail & mask]`
// 6. Store `tail + 1` with Release (hands the slot back to the producer)
//
// ## Slot ownership
//
// Slots in `[tail, head)` belong to the consumer; all others belong to the
// producer. Each side only touches slots it owns, so no slot is ever read and
// written at once while the SPSC contract holds.
//
// =============================================================================

/// Slots allocated by [`RingBuffer::default`].
pub const DEFAULT_CAPACITY: usize = 1024;

/// Lock-free single-producer single-consumer ring buffer.
///
/// Exactly one thread may call [`push`](Self::push) and exactly one thread may
/// call [`pop`](Self::pop); they may be the same thread. Both calls are
/// non-blocking and loop-free: a full ring makes `push` return `false`, an
/// empty ring makes `pop` return `None`, and waiting is left to the caller
/// (see [`Backoff`](crate::Backoff)).
///
/// With the default `spsc-guard` feature, overlapping calls into one role
/// from two threads panic. The check is a single compare-and-swap per call:
/// it catches overlap it happens to observe, not every misuse.
///
/// # Example
///
/// ```
/// use ringguard::RingBuffer;
/// use std::sync::Arc;
/// use std::thread;
///
/// let ring = Arc::new(RingBuffer::<u64>::new(64));
/// let producer = Arc::clone(&ring);
///
/// let handle = thread::spawn(move || {
///     for i in 0..1000 {
///         while !producer.push(i) {
///             std::hint::spin_loop();
///         }
///     }
/// });
///
/// let mut expected = 0;
/// while expected < 1000 {
///     if let Some(v) = ring.pop() {
///         assert_eq!(v, expected);
///         expected += 1;
///     }
/// }
/// handle.join().unwrap();
/// ```
pub struct RingBuffer<T> {
    // === PRODUCER HOT ===
    /// Next write position (written by producer, read by consumer)
    head: CachePadded<AtomicU64>,
    push_claim: CachePadded<RoleClaim>,

    // === CONSUMER HOT ===
    /// Next read position (written by consumer, read by producer)
    tail: CachePadded<AtomicU64>,
    pop_claim: CachePadded<RoleClaim>,

    // === FIXED AT CONSTRUCTION ===
    mask: usize,
    /// Fixed-size slot storage; never grows or shrinks.
    storage: Box<[UnsafeCell<MaybeUninit<T>>]>,
}

// SAFETY: values move between threads through the slots, hence `T: Send`.
// Concurrent access is coordinated by the Release/Acquire cursor protocol
// described above; each slot is touched by at most one role at a time.
unsafe impl<T: Send> Send for RingBuffer<T> {}
unsafe impl<T: Send> Sync for RingBuffer<T> {}

impl<T> RingBuffer<T> {
    /// Creates a ring with room for at least `capacity` values.
    ///
    /// The capacity is rounded up to the next power of two (minimum 1), so
    /// [`capacity`](Self::capacity) reports the rounded value: `new(5)` holds
    /// 8 values, `new(8)` holds 8, `new(0)` holds 1.
    ///
    /// # Panics
    ///
    /// Panics if the rounded capacity does not fit in `usize`.
    pub fn new(capacity: usize) -> Self {
        let Some(slots) = capacity.max(1).checked_next_power_of_two() else {
            panic!("ring capacity {capacity} cannot be rounded to a power of two");
        };

        let storage: Box<[_]> = (0..slots)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect();

        debug!(requested = capacity, capacity = slots, "ring buffer allocated");

        Self {
            head: CachePadded::new(AtomicU64::new(0)),
            push_claim: CachePadded::new(RoleClaim::new()),
            tail: CachePadded::new(AtomicU64::new(0)),
            pop_claim: CachePadded::new(RoleClaim::new()),
            mask: slots - 1,
            storage,
        }
    }

    // ---------------------------------------------------------------------
    // INTROSPECTION
    // ---------------------------------------------------------------------

    /// Number of slots; a power of two, fixed for the ring's lifetime.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Approximate number of values in the ring.
    ///
    /// Both cursors are read with Relaxed loads, so under concurrent activity
    /// the answer may be stale the instant it returns. Never use it to decide
    /// whether a `push` or `pop` will succeed; call them and check the result.
    #[inline]
    pub fn len(&self) -> usize {
        // Two Relaxed loads may disagree; clamp into [0, capacity]
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Relaxed);
        (head.saturating_sub(tail) as usize).min(self.capacity())
    }

    /// Approximate emptiness, same caveats as [`len`](Self::len).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Approximate fullness, same caveats as [`len`](Self::len).
    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity()
    }

    // ---------------------------------------------------------------------
    // PRODUCER API
    // ---------------------------------------------------------------------

    /// Appends `value`, or returns `false` if the ring is full. A rejected
    /// value is dropped; nothing is written.
    ///
    /// Must only be called from the producer thread.
    ///
    /// # Panics
    ///
    /// With `spsc-guard`, panics if another thread is inside `push` at the
    /// same time.
    #[inline]
    pub fn push(&self, value: T) -> bool {
        let _claim = self.push_claim.enter(Role::Producer);

        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        debug_assert_cursor_order!(tail, head);

        if head.wrapping_sub(tail) >= self.capacity() as u64 {
            return false;
        }

        let slot = &self.storage[(head as usize) & self.mask];
        // SAFETY: head - tail < capacity, so the slot at `head` is outside
        // [tail, head) and owned by the producer. The consumer will not read
        // it until it observes the Release store below.
        slot.with_mut(|ptr| unsafe { ptr.write(MaybeUninit::new(value)) });

        let new_head = head.wrapping_add(1);
        debug_assert_bounded_count!(new_head.wrapping_sub(tail) as usize, self.capacity());

        self.head.store(new_head, Ordering::Release);
        true
    }

    // ---------------------------------------------------------------------
    // CONSUMER API
    // ---------------------------------------------------------------------

    /// Removes the oldest value, or returns `None` if the ring is empty.
    ///
    /// Must only be called from the consumer thread.
    ///
    /// # Panics
    ///
    /// With `spsc-guard`, panics if another thread is inside `pop` at the
    /// same time.
    #[inline]
    pub fn pop(&self) -> Option<T> {
        let _claim = self.pop_claim.enter(Role::Consumer);

        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        debug_assert_cursor_order!(tail, head);

        if tail == head {
            return None;
        }

        debug_assert_readable!(tail, tail, head);
        let slot = &self.storage[(tail as usize) & self.mask];
        // SAFETY: tail < head, so the slot was initialized by a push whose
        // Release store on head we observed with Acquire. The value is moved
        // out exactly once; after the store below the slot counts as empty.
        let value = slot.with(|ptr| unsafe { (*ptr).assume_init_read() });

        self.tail.store(tail.wrapping_add(1), Ordering::Release);
        Some(value)
    }
}

impl<T> Default for RingBuffer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl<T> fmt::Debug for RingBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl<T> Drop for RingBuffer<T> {
    fn drop(&mut self) {
        // Drop every value still in [tail, head)
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Relaxed);

        let mut pos = tail;
        while pos != head {
            debug_assert_readable!(pos, tail, head);
            let slot = &self.storage[(pos as usize) & self.mask];
            // SAFETY: `&mut self` rules out concurrent access, and every
            // position in [tail, head) holds an initialized value.
            slot.with_mut(|ptr| unsafe { (*ptr).assume_init_drop() });
            pos = pos.wrapping_add(1);
        }
    }
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_leaves_ring_empty() {
        let ring = RingBuffer::<u64>::new(8);

        assert!(ring.push(42));
        assert_eq!(ring.len(), 1);
        assert_eq!(ring.pop(), Some(42));
        assert_eq!(ring.len(), 0);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_pop_on_fresh_ring_is_none() {
        let ring = RingBuffer::<u64>::new(8);
        assert_eq!(ring.pop(), None);

        // Also after draining
        assert!(ring.push(1));
        assert_eq!(ring.pop(), Some(1));
        assert_eq!(ring.pop(), None);
    }

    #[test]
    fn test_capacity_rounds_to_power_of_two() {
        assert_eq!(RingBuffer::<u8>::new(5).capacity(), 8);
        assert_eq!(RingBuffer::<u8>::new(8).capacity(), 8);
        assert_eq!(RingBuffer::<u8>::new(9).capacity(), 16);
        assert_eq!(RingBuffer::<u8>::new(1).capacity(), 1);
        assert_eq!(RingBuffer::<u8>::new(0).capacity(), 1);
        assert_eq!(RingBuffer::<u8>::default().capacity(), DEFAULT_CAPACITY);
    }

    #[test]
    fn test_full_ring_rejects_until_pop() {
        let ring = RingBuffer::<u64>::new(4);

        for i in 0..4 {
            assert!(ring.push(i), "push {} should fit", i);
        }
        assert!(ring.is_full());
        assert!(!ring.push(99));
        assert_eq!(ring.len(), 4);

        assert_eq!(ring.pop(), Some(0));
        assert!(ring.push(4));
        assert!(!ring.push(5));

        let drained: Vec<_> = std::iter::from_fn(|| ring.pop()).collect();
        assert_eq!(drained, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_fifo_across_wraparound() {
        let ring = RingBuffer::<u64>::new(4);
        let mut next_in = 0u64;
        let mut next_out = 0u64;

        // Many laps around a 4-slot ring with uneven fill levels
        for round in 0..1000u64 {
            for _ in 0..(round % 4) + 1 {
                if ring.push(next_in) {
                    next_in += 1;
                }
            }
            for _ in 0..(round % 3) + 1 {
                if let Some(v) = ring.pop() {
                    assert_eq!(v, next_out);
                    next_out += 1;
                }
            }
        }
        while let Some(v) = ring.pop() {
            assert_eq!(v, next_out);
            next_out += 1;
        }
        assert_eq!(next_in, next_out);
        assert!(next_in > 1000);
    }

    #[test]
    fn test_drop_releases_remaining_items() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        static DROP_COUNT: AtomicUsize = AtomicUsize::new(0);

        struct DropTracker {
            _id: u64,
        }

        impl Drop for DropTracker {
            fn drop(&mut self) {
                DROP_COUNT.fetch_add(1, Ordering::SeqCst);
            }
        }

        DROP_COUNT.store(0, Ordering::SeqCst);

        let ring = RingBuffer::<DropTracker>::new(8);
        for i in 0..5 {
            assert!(ring.push(DropTracker { _id: i }));
        }

        // Popped values belong to the caller
        let popped = ring.pop();
        assert!(popped.is_some());
        assert_eq!(DROP_COUNT.load(Ordering::SeqCst), 0);
        drop(popped);
        assert_eq!(DROP_COUNT.load(Ordering::SeqCst), 1);

        // A rejected push hands the value back by dropping it, once
        let full = RingBuffer::<DropTracker>::new(1);
        assert!(full.push(DropTracker { _id: 100 }));
        assert!(!full.push(DropTracker { _id: 101 }));
        assert_eq!(DROP_COUNT.load(Ordering::SeqCst), 2);
        drop(full);
        assert_eq!(DROP_COUNT.load(Ordering::SeqCst), 3);

        // The 4 left behind are dropped with the ring
        drop(ring);
        assert_eq!(DROP_COUNT.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn test_debug_does_not_print_contents() {
        let ring = RingBuffer::<&str>::new(4);
        assert!(ring.push("secret"));
        let out = format!("{:?}", ring);
        assert!(out.contains("capacity: 4"));
        assert!(out.contains("len: 1"));
        assert!(!out.contains("secret"));
    }

    #[cfg(feature = "spsc-guard")]
    mod guard {
        use super::*;
        use std::panic::{self, AssertUnwindSafe};
        use std::sync::{mpsc, Arc};
        use std::thread;

        #[test]
        fn test_push_while_push_claimed_panics() {
            let ring = RingBuffer::<u64>::new(8);
            let held = ring.push_claim.enter(Role::Producer);

            let result = panic::catch_unwind(AssertUnwindSafe(|| ring.push(1)));
            assert!(result.is_err(), "overlapping push must be rejected");

            drop(held);
            assert!(ring.push(2), "ring stays usable once the holder leaves");
            assert_eq!(ring.pop(), Some(2));
        }

        #[test]
        fn test_pop_while_pop_claimed_panics() {
            let ring = RingBuffer::<u64>::new(8);
            assert!(ring.push(7));
            let held = ring.pop_claim.enter(Role::Consumer);

            let result = panic::catch_unwind(AssertUnwindSafe(|| ring.pop()));
            assert!(result.is_err(), "overlapping pop must be rejected");

            drop(held);
            assert_eq!(ring.pop(), Some(7));
        }

        #[test]
        fn test_roles_do_not_block_each_other() {
            let ring = RingBuffer::<u64>::new(8);
            let _producer_busy = ring.push_claim.enter(Role::Producer);

            // A held producer claim must not affect the consumer role
            assert_eq!(ring.pop(), None);
        }

        #[test]
        fn test_claims_cleared_after_every_return_path() {
            let ring = RingBuffer::<u64>::new(1);

            assert!(ring.push(1));
            assert!(!ring.push_claim.is_claimed());
            assert!(!ring.push(2)); // full
            assert!(!ring.push_claim.is_claimed());

            assert_eq!(ring.pop(), Some(1));
            assert!(!ring.pop_claim.is_claimed());
            assert_eq!(ring.pop(), None); // empty
            assert!(!ring.pop_claim.is_claimed());
        }

        #[test]
        fn test_second_thread_rejected_while_claim_held() {
            let ring = Arc::new(RingBuffer::<u64>::new(8));
            let held = ring.push_claim.enter(Role::Producer);

            let (tx, rx) = mpsc::channel();
            let intruder = Arc::clone(&ring);
            let handle = thread::spawn(move || {
                let rejected =
                    panic::catch_unwind(AssertUnwindSafe(|| intruder.push(1))).is_err();
                tx.send(rejected).unwrap();
            });

            assert!(rx.recv().unwrap(), "intruding producer must panic");
            handle.join().unwrap();
            drop(held);
            assert!(ring.is_empty());
        }
    }
}
