//! Tracing hooks for ringguard.
//!
//! Enable with `--features tracing`. Without the feature every macro below
//! expands to nothing, so `push`/`pop` carry no logging cost.

/// Install a `tracing-subscriber` fmt layer filtered by `RUST_LOG`.
///
/// Falls back to `ringguard=debug,hotloop=info,demo=info` when `RUST_LOG` is
/// unset. Calling it twice is harmless: the second installation is ignored.
#[cfg(feature = "tracing")]
pub fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ringguard=debug,hotloop=info,demo=info"));

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_names(true)
                .with_timer(fmt::time::uptime()),
        )
        .with(filter)
        .try_init();
}

#[cfg(not(feature = "tracing"))]
pub const fn init_tracing() {}

#[cfg(feature = "tracing")]
#[allow(unused_imports)]
pub(crate) use tracing::{debug, error};

#[cfg(not(feature = "tracing"))]
macro_rules! debug_noop {
    ($($arg:tt)*) => {};
}

// Only the guard logs errors
#[cfg(not(feature = "tracing"))]
#[cfg_attr(not(feature = "spsc-guard"), allow(unused_macros))]
macro_rules! error_noop {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
pub(crate) use debug_noop as debug;
#[cfg(not(feature = "tracing"))]
#[cfg_attr(not(feature = "spsc-guard"), allow(unused_imports))]
pub(crate) use error_noop as error;
