//! Process-wide logging setup for the bakery binaries.

pub mod tracing;

pub use crate::tracing::LogFormat;

/// Install the global subscriber using `LOG_FORMAT` (`json` or `pretty`).
///
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    let format = std::env::var("LOG_FORMAT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or_default();
    let _ = crate::tracing::init(format);
}
