//! Server settings read from `CALIBRATE_API_*` environment variables.

use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

const ENV_BIND_ADDR: &str = "CALIBRATE_API_BIND_ADDR";
const ENV_API_TOKEN: &str = "CALIBRATE_API_TOKEN";
const ENV_DB_PATH: &str = "CALIBRATE_API_DB_PATH";
const DEFAULT_BIND_ADDR: SocketAddr = SocketAddr::V4(std::net::SocketAddrV4::new(
    std::net::Ipv4Addr::LOCALHOST,
    8080,
));

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// Shared bearer token clients present on the record endpoints
    pub api_token: String,
    /// Records database; memory-only when unset
    pub db_path: Option<PathBuf>,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("api_token", &"[REDACTED]")
            .field("db_path", &self.db_path)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = match non_blank(lookup(ENV_BIND_ADDR)) {
            Some(raw) => raw.parse::<SocketAddr>().map_err(|_| {
                ConfigError::Invalid(format!(
                    "{ENV_BIND_ADDR} must be a socket address like {DEFAULT_BIND_ADDR} (got '{raw}')"
                ))
            })?,
            None => DEFAULT_BIND_ADDR,
        };

        let api_token =
            non_blank(lookup(ENV_API_TOKEN)).ok_or(ConfigError::MissingVar(ENV_API_TOKEN))?;
        if api_token.chars().any(char::is_whitespace) {
            return Err(ConfigError::Invalid(format!(
                "{ENV_API_TOKEN} must not contain whitespace"
            )));
        }

        Ok(Self {
            bind_addr,
            api_token,
            db_path: non_blank(lookup(ENV_DB_PATH)).map(PathBuf::from),
        })
    }

    #[cfg(test)]
    pub fn for_tests(api_token: &str) -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            api_token: api_token.to_string(),
            db_path: None,
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|trimmed| !trimmed.is_empty())
}
