//! Error types for hotloop constructors.

use thiserror::Error;

/// Errors raised while building clocks and tickers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HotLoopError {
    /// A ticker interval of zero would fire on every poll.
    #[error("tick interval must be greater than zero")]
    ZeroInterval,

    /// The interval does not fit in the clock's nanosecond range.
    #[error("tick interval of {secs}s exceeds the clock range")]
    IntervalTooLarge {
        /// Requested interval, whole seconds.
        secs: u64,
    },

    /// A cycles-per-nanosecond ratio that is zero, negative, or not finite.
    #[error("cycles-per-nanosecond ratio must be finite and positive")]
    InvalidRatio,

    /// The cycle counter is only available on `x86_64`.
    #[error("TSC clock requires the x86_64 architecture")]
    TscUnsupported,

    /// Calibration measured no usable cycles-per-nanosecond ratio.
    #[error("TSC calibration failed: measured {cycles} cycles over {nanos} ns")]
    CalibrationFailed {
        /// Counter ticks observed during the window.
        cycles: u64,
        /// Wall-clock nanoseconds of the window.
        nanos: u64,
    },

    /// The OS refused to start the timer thread behind a `StdTicker`.
    #[error("failed to spawn ticker thread: {kind:?}")]
    TimerSpawn {
        /// Kind of the underlying I/O error.
        kind: std::io::ErrorKind,
    },
}

impl HotLoopError {
    /// Returns `true` if the error comes from the host rather than the
    /// caller's arguments.
    #[inline]
    pub fn is_platform(&self) -> bool {
        matches!(
            self,
            Self::TscUnsupported | Self::CalibrationFailed { .. } | Self::TimerSpawn { .. }
        )
    }
}
