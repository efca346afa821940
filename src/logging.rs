//! Structured logging for the provider process.
//!
//! Logs go to **stderr**: stdout carries the handshake line the host parses.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: filter directives (e.g. `info`, `googlespreadsheets_provider=debug`)
//!
//! ```bash
//! # Trace every Sheets API request the provider makes
//! RUST_LOG=googlespreadsheets_provider::sheets=debug ./hemmer-provider-googlespreadsheets
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_DIRECTIVE: &str = "info";

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn stderr_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
}

/// Install the global subscriber, defaulting to `info` when `RUST_LOG` is unset.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(env_filter(DEFAULT_DIRECTIVE))
        .with(stderr_layer())
        .init();
}

/// Like [`init_logging`], but returns `false` instead of panicking when a
/// subscriber is already installed.
pub fn try_init_logging() -> bool {
    tracing_subscriber::registry()
        .with(env_filter(DEFAULT_DIRECTIVE))
        .with(stderr_layer())
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_filter_parsing() {
        assert!(EnvFilter::try_new(DEFAULT_DIRECTIVE).is_ok());
        assert!(EnvFilter::try_new("googlespreadsheets_provider=debug").is_ok());
        assert!(EnvFilter::try_new("warn,googlespreadsheets_provider::sheets=trace").is_ok());
    }

    #[test]
    fn test_try_init_is_idempotent() {
        // The first call may or may not win depending on test ordering;
        // the second must never panic.
        let _ = try_init_logging();
        assert!(!try_init_logging());
    }
}
