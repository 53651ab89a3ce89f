//! Tracing subscriber setup.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter directive when neither `RUST_LOG` nor `--log-level` is given.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Build the env filter: `RUST_LOG` wins, then the CLI level, then the default.
pub fn build_filter(cli_level: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = cli_level.unwrap_or(DEFAULT_LOG_LEVEL);
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL))
    })
}

/// Install the global subscriber. Logs go to stderr so stdout carries command output.
///
/// Calling this twice is harmless: the second registration is ignored.
pub fn init(cli_level: Option<&str>) {
    let _ = tracing_subscriber::registry()
        .with(build_filter(cli_level))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_twice_does_not_panic() {
        init(Some("debug"));
        init(Some("warn"));
    }
}
