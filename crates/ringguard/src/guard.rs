//! SPSC contract guard.
//!
//! Each role (producer, consumer) owns one claim flag. A call into the role
//! claims the flag with a single compare-and-swap and a [`ClaimGuard`] clears
//! it when the call returns or unwinds. A second thread entering the same
//! role while the flag is set finds the CAS failing and panics.
//!
//! This is a detector, not a lock. Two overlapping calls are caught only if
//! one of them observes the other's claim; calls that race closely without
//! overlapping slip through. The guard turns a silent data race into a loud
//! failure often enough to surface misuse in tests. It never makes the ring
//! safe for multiple producers or multiple consumers.
//!
//! Built with `default-features = false` (no `spsc-guard`), the flag and its
//! CAS are compiled out. That removes the detection; the misuse is still
//! undefined behaviour.
//!
//! Everything here is crate-internal; callers only ever see the panic.
//!
//! ```compile_fail
//! use ringguard::guard::Role;
//! ```

use std::fmt;
#[cfg(not(feature = "spsc-guard"))]
use std::marker::PhantomData;

#[cfg(feature = "spsc-guard")]
use crate::sync::{AtomicBool, Ordering};
#[cfg(feature = "spsc-guard")]
use crate::trace::error;

/// The two sides of the single-producer single-consumer contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Role {
    /// The only thread allowed to call `push`.
    Producer,
    /// The only thread allowed to call `pop`.
    Consumer,
}

impl Role {
    /// The ring operation reserved to this role.
    #[cfg_attr(not(feature = "spsc-guard"), allow(dead_code))]
    pub(crate) const fn operation(self) -> &'static str {
        match self {
            Self::Producer => "push",
            Self::Consumer => "pop",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Producer => f.write_str("producer"),
            Self::Consumer => f.write_str("consumer"),
        }
    }
}

/// Per-role claim flag.
pub(crate) struct RoleClaim {
    #[cfg(feature = "spsc-guard")]
    claimed: AtomicBool,
}

impl RoleClaim {
    pub(crate) fn new() -> Self {
        Self {
            #[cfg(feature = "spsc-guard")]
            claimed: AtomicBool::new(false),
        }
    }

    /// Claim the role for the duration of one call.
    ///
    /// Acquire on success pairs with the Release in [`ClaimGuard::drop`], so a
    /// role handed from one thread to another (e.g. across a `join`) sees the
    /// previous holder's cursor writes.
    ///
    /// # Panics
    ///
    /// Panics if another call already holds the claim. The panicking caller
    /// never owned the flag and leaves it untouched.
    #[inline]
    pub(crate) fn enter(&self, role: Role) -> ClaimGuard<'_> {
        #[cfg(feature = "spsc-guard")]
        {
            if self
                .claimed
                .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_err()
            {
                contract_violation(role);
            }
            ClaimGuard {
                claimed: &self.claimed,
            }
        }

        #[cfg(not(feature = "spsc-guard"))]
        {
            let _ = role;
            ClaimGuard {
                _claim: PhantomData,
            }
        }
    }

    /// Whether a call currently holds the claim.
    #[cfg(all(test, feature = "spsc-guard"))]
    pub(crate) fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Relaxed)
    }
}

/// Releases a role claim on drop, including during unwinding.
#[must_use = "the claim is released as soon as the guard is dropped"]
pub(crate) struct ClaimGuard<'a> {
    #[cfg(feature = "spsc-guard")]
    claimed: &'a AtomicBool,
    #[cfg(not(feature = "spsc-guard"))]
    _claim: PhantomData<&'a ()>,
}

impl Drop for ClaimGuard<'_> {
    #[inline]
    fn drop(&mut self) {
        #[cfg(feature = "spsc-guard")]
        self.claimed.store(false, Ordering::Release);
    }
}

#[cfg(feature = "spsc-guard")]
#[cold]
#[inline(never)]
fn contract_violation(role: Role) -> ! {
    error!(
        role = %role,
        operation = role.operation(),
        "SPSC contract violated: overlapping calls into one role"
    );
    panic!(
        "ringguard: concurrent {} on SPSC RingBuffer - only one {} allowed",
        role.operation(),
        role
    );
}
