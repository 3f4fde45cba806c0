//! Tracing bootstrap: a compact, ANSI-free subscriber filtered by the
//! configured level, with `RUST_LOG` taking precedence when set.

use crate::config::TelemetryConfig;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("invalid log filter '{value}'")]
    Filter {
        value: String,
        #[source]
        source: ParseError,
    },
    #[error("tracing subscriber already installed")]
    AlreadyInstalled(#[from] SetGlobalDefaultError),
}

/// Install the process-wide subscriber. Call once at startup; a second call
/// fails rather than silently replacing the first.
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV)
        .unwrap_or_else(|_| config.log_level.clone());

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(parse_filter(&directives)?)
        .with_target(false)
        .compact()
        .with_ansi(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn parse_filter(directives: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(directives).map_err(|source| TelemetryError::Filter {
        value: directives.to_string(),
        source,
    })
}
