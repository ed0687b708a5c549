//! Tracing subscriber setup for the binary.
//!
//! Logs go to stderr so they never mix with the report on stdout.

use tracing_subscriber::{EnvFilter, fmt};

/// Initialize logging.
///
/// # Environment Variables
/// - `RUST_LOG` - Log level filter (default: "warn", "debug" with `verbose`)
pub fn init(verbose: bool) {
    init_with_level(if verbose { "debug" } else { "warn" })
}

/// Initialize logging with a specific level, unless `RUST_LOG` is set.
///
/// Calling it twice is harmless; the second call is ignored.
pub fn init_with_level(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true)
        .try_init();
}

/// Initialize logging for tests
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
