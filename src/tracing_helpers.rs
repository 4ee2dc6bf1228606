//! Logging macros that cost nothing unless the `tracing` feature is on.
//!
//! With the feature enabled they forward to the matching `tracing` macro;
//! without it they expand to nothing, so arguments are never evaluated.
//!
//! ```bash
//! RUST_LOG=olc_btree=trace cargo test --features tracing --test stress_tests
//! ```
//!
//! Hot paths (restarts) log at `trace`, structural changes (splits, root
//! growth, discarded siblings) at `debug`, and unexpected-but-recoverable
//! events at `warn`.

#![allow(unused_macros, unused_imports)]

/// Trace-level event. Expands to nothing without the `tracing` feature.
#[cfg(feature = "tracing")]
macro_rules! trace_log {
    ($($arg:tt)*) => {
        tracing::trace!($($arg)*)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_log {
    ($($arg:tt)*) => {};
}

/// Debug-level event. Expands to nothing without the `tracing` feature.
#[cfg(feature = "tracing")]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! debug_log {
    ($($arg:tt)*) => {};
}

/// Warn-level event. Expands to nothing without the `tracing` feature.
#[cfg(feature = "tracing")]
macro_rules! warn_log {
    ($($arg:tt)*) => {
        tracing::warn!($($arg)*)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! warn_log {
    ($($arg:tt)*) => {};
}

pub(crate) use debug_log;
pub(crate) use trace_log;
pub(crate) use warn_log;
