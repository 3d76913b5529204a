//! Synchronization primitives used by the ring.
//!
//! With `--features loom` every atomic and every slot cell is swapped for its
//! loom counterpart so the model checker can explore the real `RingBuffer`
//! rather than a hand-written replica.

#[cfg(feature = "loom")]
pub(crate) use loom::cell::UnsafeCell;
#[cfg(feature = "loom")]
#[cfg_attr(not(feature = "spsc-guard"), allow(unused_imports))]
pub(crate) use loom::sync::atomic::{AtomicBool, AtomicU64, Ordering};

#[cfg(not(feature = "loom"))]
#[cfg_attr(not(feature = "spsc-guard"), allow(unused_imports))]
pub(crate) use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// `std` cell exposing loom's closure-based access API.
#[cfg(not(feature = "loom"))]
#[derive(Debug)]
#[repr(transparent)]
pub(crate) struct UnsafeCell<T>(std::cell::UnsafeCell<T>);

#[cfg(not(feature = "loom"))]
impl<T> UnsafeCell<T> {
    #[inline]
    pub(crate) const fn new(value: T) -> Self {
        Self(std::cell::UnsafeCell::new(value))
    }

    #[inline]
    pub(crate) fn with<R>(&self, f: impl FnOnce(*const T) -> R) -> R {
        f(self.0.get())
    }

    #[inline]
    pub(crate) fn with_mut<R>(&self, f: impl FnOnce(*mut T) -> R) -> R {
        f(self.0.get())
    }
}
