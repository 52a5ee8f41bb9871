//! Logging macros gated by a per-module `ENABLE_LOGS` flag.
//!
//! Hot paths such as the sampling loop log on every state change; the flag
//! lets a module silence them without touching `RUST_LOG` for the rest of
//! the process.
//!
//! ```ignore
//! const ENABLE_LOGS: bool = true;
//! use crate::{log_info, log_warn};
//!
//! log_info!("sampling loop started at {}ms", interval_ms);
//! ```

/// `log::info!` when the calling module's `ENABLE_LOGS` is set.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            ::log::info!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            ::log::warn!($($arg)*);
        }
    };
}

/// Errors are gated too; the sampling loop reports worker failures here.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            ::log::error!($($arg)*);
        }
    };
}
