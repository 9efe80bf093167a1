use clap::ValueEnum;
use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

/// Verbosity accepted by `--log-level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Filter directive: our own crate at the chosen level, sqlx kept quiet
    /// unless debugging.
    pub fn directive(self) -> &'static str {
        match self {
            LogLevel::Debug => "nail_catalog_sync=debug,catalog_sync=debug,sqlx=info",
            LogLevel::Info => "nail_catalog_sync=info,catalog_sync=info,sqlx=warn",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Sets up the global tracing subscriber with a fmt formatter and env filter.
///
/// `RUST_LOG` wins when set; otherwise the `--log-level` directive applies.
/// Logs go to stderr so `--summary-json` output on stdout stays parseable.
pub fn init_tracing(level: LogLevel) -> Result<(), anyhow::Error> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.directive()));

    SubscriberBuilder::default()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {}", e))
}
