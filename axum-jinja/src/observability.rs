//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

use crate::{
    config::LoggingConfig,
    error::{Error, Result},
};

/// Install a global fmt subscriber filtered by `config.level`
///
/// `RUST_LOG`-style directives are accepted; an unparsable level falls back
/// to `info`. Fails if a global subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|err| Error::Internal(format!("failed to install tracing subscriber: {}", err)))?;

    tracing::info!(level = %config.level, json = config.json, "Tracing initialized");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_twice_fails_cleanly() {
        let config = LoggingConfig {
            level: "not a filter [".to_string(),
            json: false,
        };
        // The first call may lose the race against another test's subscriber
        let _ = init_tracing(&config);
        assert!(init_tracing(&config).is_err());
    }
}
