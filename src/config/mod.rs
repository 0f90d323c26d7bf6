//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;

/// Default life each side starts a duel with
pub const DEFAULT_STARTING_LIFE: i32 = 100;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Life each side starts a duel with
    pub starting_life: i32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // PORT wins over SERVER_ADDR when both are set
        let server_addr = match lookup("PORT") {
            Some(port) => format!("0.0.0.0:{}", port),
            None => lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8000".to_string()),
        };

        let starting_life = match lookup("STARTING_LIFE") {
            Some(raw) => match raw.trim().parse::<i32>() {
                Ok(life) if life > 0 => life,
                _ => return Err(ConfigError::Invalid("STARTING_LIFE")),
            },
            None => DEFAULT_STARTING_LIFE,
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),

            starting_life,
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
