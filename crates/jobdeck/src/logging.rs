//! Subscriber setup for `tracing` spans and `log` records.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};

fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| level_filter(level))
}

/// Filter for a configured level; an unparseable directive falls back to `info`.
fn level_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global subscriber and bridges `log` macros into it.
///
/// `RUST_LOG` overrides `config.level`. Output goes to stderr so command
/// output on stdout stays parseable. Returns `false` if a subscriber was
/// already installed, in which case nothing changes.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let json = config.format == LogFormat::Json;

    let subscriber = tracing_subscriber::registry()
        .with(build_filter(&config.level))
        .with((!json).then(|| fmt::layer().with_writer(std::io::stderr)))
        .with(json.then(|| {
            fmt::layer()
                .json()
                .with_current_span(true)
                .with_writer(std::io::stderr)
        }));

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return false;
    }
    // May already be set by the host process
    let _ = tracing_log::LogTracer::init();

    log::debug!(
        "Logging initialized (level={}, format={:?})",
        config.level,
        config.format
    );
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_level_filter_falls_back_on_bad_directive() {
        assert_eq!(level_filter("warn").to_string(), "warn");
        assert_eq!(level_filter("jobdeck=debug").to_string(), "jobdeck=debug");
        assert_eq!(level_filter("jobdeck=loud").to_string(), "info");
    }

    #[test]
    #[serial]
    fn test_init_logging_is_idempotent() {
        let config = LoggingConfig::default();
        let first = init_logging(&config);
        let second = init_logging(&config);
        // another test may have installed a subscriber first
        assert!(!second);
        if first {
            log::info!("log records reach the subscriber");
        }
    }
}
