//! Debug assertion macros for ring buffer invariants.
//!
//! Active only in debug builds (`debug_assert!`), so release builds pay
//! nothing. `head` counts writes, `tail` counts reads.

// =============================================================================
// Cursor ordering: tail ≤ head
// =============================================================================

/// Assert the read cursor never passes the write cursor.
///
/// Used in: `push()` and `pop()` right after loading both cursors.
macro_rules! debug_assert_cursor_order {
    ($tail:expr, $head:expr) => {
        debug_assert!(
            $tail <= $head,
            "cursor order violated: tail {} is past head {}",
            $tail,
            $head
        )
    };
}

// =============================================================================
// Bounded count: 0 ≤ head - tail ≤ capacity
// =============================================================================

/// Assert the occupied count never exceeds capacity.
///
/// Used in: `push()` before publishing the new head.
macro_rules! debug_assert_bounded_count {
    ($count:expr, $capacity:expr) => {
        debug_assert!(
            $count <= $capacity,
            "bounded count violated: {} occupied slots exceed capacity {}",
            $count,
            $capacity
        )
    };
}

// =============================================================================
// Readable range: only [tail, head) holds initialized values
// =============================================================================

/// Assert a read targets an initialized slot.
///
/// Used in: `pop()` before `assume_init_read()`, `Drop` for leftovers.
macro_rules! debug_assert_readable {
    ($pos:expr, $tail:expr, $head:expr) => {
        debug_assert!(
            $pos >= $tail && $pos < $head,
            "reading slot at position {} outside initialized range [{}, {})",
            $pos,
            $tail,
            $head
        )
    };
}

pub(crate) use debug_assert_bounded_count;
pub(crate) use debug_assert_cursor_order;
pub(crate) use debug_assert_readable;
