// Infrastructure: Credentials and client configuration
// Values come from the process environment, optionally seeded from a `.env` file

use std::fmt;
use std::time::Duration;

pub const API_URL_VAR: &str = "LETSOPT_API_URL";
pub const API_KEY_VAR: &str = "LETSOPT_API_KEY";
pub const CONNECT_TIMEOUT_VAR: &str = "LETSOPT_CONNECT_TIMEOUT_SECS";
pub const CHUNK_SIZE_VAR: &str = "LETSOPT_CHUNK_SIZE";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("Invalid value for {name}: '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Endpoint and access key of the solve service
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub url: String,
    pub api_key: String,
}

impl Credentials {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
        }
    }

    /// Read `LETSOPT_API_URL` and `LETSOPT_API_KEY`, loading `.env` first
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let url = lookup(API_URL_VAR)
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing(API_URL_VAR))?;
        let api_key = lookup(API_KEY_VAR)
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing(API_KEY_VAR))?;
        Ok(Self::new(url.trim(), api_key.trim()))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("url", &self.url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Transport settings for the gRPC job client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub connect_timeout: Duration,
    /// Attachment bytes per streamed message
    pub chunk_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            chunk_size: 64 * 1024,
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Defaults overridden by `LETSOPT_CONNECT_TIMEOUT_SECS` and `LETSOPT_CHUNK_SIZE`
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(value) = lookup(CONNECT_TIMEOUT_VAR) {
            let secs: u64 = value.trim().parse().map_err(|_| ConfigError::Invalid {
                name: CONNECT_TIMEOUT_VAR,
                value: value.clone(),
            })?;
            config.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(value) = lookup(CHUNK_SIZE_VAR) {
            config.chunk_size = match value.trim().parse::<usize>() {
                Ok(size) if size > 0 => size,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: CHUNK_SIZE_VAR,
                        value,
                    })
                }
            };
        }
        Ok(config)
    }
}
