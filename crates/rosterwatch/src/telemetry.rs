//! Tracing setup for the binary and for hosts that have none of their own.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Targets that receive the default level.
const TARGETS: [&str; 6] = [
    "rosterwatch",
    "rosterwatch_transport",
    "rosterwatch_protocol",
    "rosterwatch_session",
    "rosterwatch_tick",
    "rosterwatch_ratelimit",
];

/// The filter used when `RUST_LOG` is unset, e.g.
/// `rosterwatch=info,rosterwatch_transport=info,...`.
pub fn default_directive(default_log_level: &str) -> String {
    TARGETS
        .iter()
        .map(|target| format!("{target}={default_log_level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Initialize the tracing subscriber with the specified default log level.
///
/// The level can be overridden with the `RUST_LOG` environment variable.
/// Thread names are printed so lines from the `presence-monitor` thread
/// stand out. Does nothing if a global subscriber is already installed.
///
/// # Examples
///
/// ```no_run
/// rosterwatch::telemetry::init_tracing("info");
/// ```
pub fn init_tracing(default_log_level: &str) {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directive(default_log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_thread_names(true))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive_covers_every_crate() {
        let directive = default_directive("debug");

        assert!(directive.starts_with("rosterwatch=debug,"));
        assert!(directive.contains("rosterwatch_session=debug"));
        assert_eq!(directive.split(',').count(), TARGETS.len());
    }

    #[test]
    fn test_init_tracing_twice_does_not_panic() {
        init_tracing("warn");
        init_tracing("warn");
    }
}
