use std::env::var;
use std::str::FromStr;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{Layer, filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Output format of the log layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" | "" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Initialize tracing with a default level and format taken from configuration.
///
/// `RUST_LOG` still overrides the level, and `RUST_LOG_FORMAT` overrides the
/// format when it is set.
pub fn init_with(level: &str, format: LogFormat) {
    let level = LevelFilter::from_str(level).unwrap_or(LevelFilter::INFO);
    initialize_tracing(level, format);
}

fn resolve_format(configured: LogFormat) -> LogFormat {
    match var("RUST_LOG_FORMAT") {
        Ok(raw) => raw.parse().unwrap_or_else(|error: String| {
            eprintln!("Ignoring RUST_LOG_FORMAT: {error}");
            configured
        }),
        Err(_) => configured,
    }
}

fn initialize_tracing(level: LevelFilter, configured: LogFormat) {
    let env_filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();

    let log_layer = match resolve_format(configured) {
        LogFormat::Json => tracing_subscriber::fmt::layer().json().with_filter(env_filter).boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_filter(env_filter)
            .boxed(),
    };

    // A second initialisation (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry().with(log_layer).try_init();
}
