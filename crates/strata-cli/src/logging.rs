//! Logging initialization.

use clap::ValueEnum;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable output.
    #[default]
    Pretty,
    /// One JSON object per event, for log aggregation.
    Json,
}

/// Maps a `-v` count to a level.
pub fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Default filter for `level`, applied when `RUST_LOG` is unset.
pub fn default_filter(level: &str) -> String {
    format!("strata_cli={level},strata_devnet={level},strata_keys={level}")
}

/// Installs the global subscriber. `RUST_LOG` overrides `verbosity`.
pub fn init_logging(verbosity: u8, format: LogFormat) {
    let level = level_for(verbosity);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(level).into());

    let registry = tracing_subscriber::registry().with(env_filter);

    match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init(),
    }

    tracing::debug!(level, ?format, "Logging initialized");
}
