//! Logging setup using tracing.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info,ldapimporter=debug";

/// Build the log filter from `RUST_LOG`, falling back to `default`.
pub fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default))
        .unwrap_or_else(|e| {
            eprintln!("Invalid log filter {default:?}: {e}");
            EnvFilter::new("info")
        })
}

/// Initialize the tracing subscriber, human-readable or JSON.
///
/// Logs go to stderr so exports written to stdout stay clean.
pub fn init_logging(json: bool) {
    let filter = env_filter(DEFAULT_FILTER);

    let result = if json {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr)
                    .flatten_event(true),
            )
            .with(filter)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .with(filter)
            .try_init()
    };

    if let Err(e) = result {
        eprintln!("Logging already initialized: {e}");
        return;
    }

    tracing::debug!(json, "Logging initialized");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_twice_does_not_panic() {
        init_logging(false);
        init_logging(true);
    }
}
