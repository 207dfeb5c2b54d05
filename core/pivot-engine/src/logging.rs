//! FILENAME: core/pivot-engine/src/logging.rs
//! Tagged, sequenced log lines.
//!
//! Every line carries a process-wide sequence number and a category so that
//! interleaved output from the caller thread and the offload worker can be
//! put back in order:
//!
//! ```text
//! 42|I|PIVOT|materialized 12x4 result
//! ```
//!
//! Lines are emitted through the `log` facade with the category as target,
//! so any installed logger (env_logger, a test capture, nothing at all)
//! decides where they go.

use std::sync::atomic::{AtomicU64, Ordering};

pub use log::Level;

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);

pub fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::Relaxed)
}

fn level_tag(level: Level) -> &'static str {
    match level {
        Level::Error => "E",
        Level::Warn => "W",
        Level::Info => "I",
        Level::Debug => "D",
        Level::Trace => "T",
    }
}

/// True when a line at `level` for `category` would be recorded.
pub fn enabled(level: Level, category: &str) -> bool {
    log::log_enabled!(target: category, level)
}

pub fn write_log(level: Level, category: &str, message: &str) {
    let seq = next_seq();
    log::log!(target: category, level, "{}|{}|{}|{}", seq, level_tag(level), category, message);
}

pub fn write_log_enter(category: &str, function: &str, params: &str) {
    write_log(Level::Debug, category, &format!("ENTER {} {}", function, params));
}

pub fn write_log_exit(category: &str, function: &str, result: &str) {
    write_log(Level::Debug, category, &format!("EXIT {} {}", function, result));
}

#[macro_export]
macro_rules! log_debug {
    ($cat:expr, $($arg:tt)*) => {
        if $crate::logging::enabled($crate::logging::Level::Debug, $cat) {
            $crate::logging::write_log($crate::logging::Level::Debug, $cat, &format!($($arg)*))
        }
    };
}

#[macro_export]
macro_rules! log_info {
    ($cat:expr, $($arg:tt)*) => {
        if $crate::logging::enabled($crate::logging::Level::Info, $cat) {
            $crate::logging::write_log($crate::logging::Level::Info, $cat, &format!($($arg)*))
        }
    };
}

#[macro_export]
macro_rules! log_warn {
    ($cat:expr, $($arg:tt)*) => {
        if $crate::logging::enabled($crate::logging::Level::Warn, $cat) {
            $crate::logging::write_log($crate::logging::Level::Warn, $cat, &format!($($arg)*))
        }
    };
}

#[macro_export]
macro_rules! log_error {
    ($cat:expr, $($arg:tt)*) => {
        if $crate::logging::enabled($crate::logging::Level::Error, $cat) {
            $crate::logging::write_log($crate::logging::Level::Error, $cat, &format!($($arg)*))
        }
    };
}

#[macro_export]
macro_rules! log_enter {
    ($cat:expr, $func:expr) => {
        if $crate::logging::enabled($crate::logging::Level::Debug, $cat) {
            $crate::logging::write_log_enter($cat, $func, "")
        }
    };
    ($cat:expr, $func:expr, $($arg:tt)*) => {
        if $crate::logging::enabled($crate::logging::Level::Debug, $cat) {
            $crate::logging::write_log_enter($cat, $func, &format!($($arg)*))
        }
    };
}

#[macro_export]
macro_rules! log_exit {
    ($cat:expr, $func:expr) => {
        if $crate::logging::enabled($crate::logging::Level::Debug, $cat) {
            $crate::logging::write_log_exit($cat, $func, "")
        }
    };
    ($cat:expr, $func:expr, $($arg:tt)*) => {
        if $crate::logging::enabled($crate::logging::Level::Debug, $cat) {
            $crate::logging::write_log_exit($cat, $func, &format!($($arg)*))
        }
    };
}
