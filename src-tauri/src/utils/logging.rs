//! Conditional logging macros gated on a module-level `ENABLE_LOGS` flag.
//!
//! Modules that use these define their own switch:
//! ```rust
//! const ENABLE_LOGS: bool = true;
//! use crate::{log_info, log_warn};
//! ```
//! so chatty paths (the capture tick) can be silenced per module without
//! touching the global filter.

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}
