//! Tracing subscriber setup
//!
//! The host embeds the capture engine, so logging goes to a file the host
//! chooses rather than to its terminal. Shared by the library and tests.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global tracing subscriber with file logging.
///
/// Environment-based filtering (RUST_LOG) applies on top of a DEBUG default.
/// Returns false if the log file could not be created or a subscriber was
/// already installed; capture proceeds without diagnostics in that case.
pub fn init_global(log_file_path: &Path) -> bool {
    let Ok(log_file) = File::create(log_file_path) else {
        return false;
    };
    tracing::subscriber::set_global_default(build_subscriber(log_file)).is_ok()
}

/// Build a subscriber writing to the given file.
pub fn build_subscriber(log_file: File) -> impl tracing::Subscriber + Send + Sync {
    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into());
    let fmt_layer = fmt::layer().with_writer(Arc::new(log_file));

    tracing_subscriber::registry().with(fmt_layer).with(env_filter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_subscriber_writes_to_file() {
        let log_file = NamedTempFile::new().unwrap();
        let subscriber = build_subscriber(log_file.reopen().unwrap());

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!("capture warning");
        });

        let contents = std::fs::read_to_string(log_file.path()).unwrap();
        assert!(contents.contains("capture warning"));
    }
}
