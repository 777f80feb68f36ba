//! Logging utilities and structured logging support

pub use log::{debug, error, info, trace, warn};

/// Initialize the logging system
///
/// Reads the `RUST_LOG` environment variable for filtering. Safe to call
/// once per process; applications should call this before engine creation
/// so device-selection diagnostics are captured.
pub fn init() {
    env_logger::init();
}

/// Initialize the logging system with a default filter when `RUST_LOG` is unset
pub fn init_with_default(default_filter: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}
