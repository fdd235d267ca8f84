use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use crate::config::{LogFormat, LoggingConfig};
use crate::error::EngineError;

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `config.level`. Fails if a global
/// subscriber is already set.
pub fn init_logging(config: &LoggingConfig) -> Result<(), EngineError> {
    let filter = build_filter(config)?;

    let result = match config.format {
        LogFormat::Json => Registry::default()
            .with(filter)
            .with(fmt::layer().json().with_current_span(false))
            .try_init(),
        LogFormat::Text => Registry::default()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .try_init(),
    };

    result.map_err(|e| EngineError::Config(format!("logging already initialised: {e}")))
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, EngineError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| EngineError::Config(format!("invalid log level {:?}: {e}", config.level))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_level_builds_a_filter() {
        assert!(build_filter(&LoggingConfig::default()).is_ok());
    }

    #[test]
    fn second_init_fails() {
        let config = LoggingConfig {
            level: "debug".into(),
            format: LogFormat::Json,
        };
        let _ = init_logging(&config);
        assert!(init_logging(&config).is_err());
    }
}
