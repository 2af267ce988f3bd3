//! Tracing/logging setup shared by every binary and test harness.

pub mod format;
pub mod subscriber;

pub use format::{LOG_FORMAT_ENV, LogFormat, ParseLogFormatError};

/// Initialize process-wide tracing in the format named by `TOKENFORGE_LOG_FORMAT`
/// (human-readable when unset).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    subscriber::init(LogFormat::from_env());
}

/// Initialize process-wide tracing with an explicit output format.
pub fn init_with(format: LogFormat) {
    subscriber::init(format);
}
