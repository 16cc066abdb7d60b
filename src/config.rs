use crate::error::ConfigError;
use crate::provider::ProviderConfig;
use std::net::SocketAddr;
use tracing::debug;

pub const DEFAULT_PORT: u16 = 5173;

/// Settings for the HTTP service.
#[derive(Debug, Clone)]
pub struct WebConfig {
    pub addr: SocketAddr,
    pub provider: ProviderConfig,
}

impl WebConfig {
    /// Loads `.env` if present, then reads `PORT` and the provider variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        load_dotenv();
        let port = parse_port(std::env::var("PORT").ok().as_deref())?;
        Ok(Self {
            addr: SocketAddr::from(([127, 0, 0, 1], port)),
            provider: ProviderConfig::from_env()?,
        })
    }
}

/// `PORT` value, or [`DEFAULT_PORT`] when unset or blank.
pub fn parse_port(raw: Option<&str>) -> Result<u16, ConfigError> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidPort(value.to_string())),
        None => Ok(DEFAULT_PORT),
    }
}

/// Loads `.env` from the working directory or its parents, if any.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => debug!(path = %path.display(), "loaded environment file"),
        Err(err) if err.not_found() => {}
        Err(err) => debug!(error = %err, "ignoring unreadable environment file"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_defaults_and_validates() {
        assert_eq!(parse_port(None), Ok(DEFAULT_PORT));
        assert_eq!(parse_port(Some("  ")), Ok(DEFAULT_PORT));
        assert_eq!(parse_port(Some(" 8080 ")), Ok(8080));
        assert_eq!(
            parse_port(Some("eighty")),
            Err(ConfigError::InvalidPort("eighty".to_string()))
        );
        assert!(parse_port(Some("70000")).is_err());
    }
}
