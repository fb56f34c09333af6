//! Console configuration parsed from environment variables.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_IDENTITY_URL: &str = "https://identitytoolkit.googleapis.com/v1";
pub const DEFAULT_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be an http(s) URL, got '{value}'")]
    InvalidUrl { var: &'static str, value: String },
    #[error("{var} must be a whole number of seconds, got '{value}'")]
    InvalidNumber { var: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl HttpTimeouts {
    #[must_use]
    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    #[must_use]
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleConfig {
    /// Backend origin without the `/api/v1` suffix or a trailing slash.
    pub api_url: String,
    pub timeouts: HttpTimeouts,
    pub download_dir: PathBuf,
}

impl ConsoleConfig {
    /// Build typed console config from environment variables.
    ///
    /// Optional:
    /// - `SENTINEL_API_URL`: default `http://localhost:8000`
    /// - `SENTINEL_REQUEST_TIMEOUT_SECS`: default 30
    /// - `SENTINEL_CONNECT_TIMEOUT_SECS`: default 10
    /// - `SENTINEL_DOWNLOAD_DIR`: default current directory
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is not http(s) or a timeout is not numeric.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_url = parse_url(
            "SENTINEL_API_URL",
            std::env::var("SENTINEL_API_URL").ok().as_deref(),
            DEFAULT_API_URL,
        )?;
        let timeouts = HttpTimeouts {
            request_secs: env_parse_u64("SENTINEL_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?,
            connect_secs: env_parse_u64("SENTINEL_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)?,
        };
        let download_dir = std::env::var("SENTINEL_DOWNLOAD_DIR").map_or_else(|_| PathBuf::from("."), PathBuf::from);
        Ok(Self { api_url, timeouts, download_dir })
    }
}

/// Identity-provider settings. Returns `None` from [`FirebaseConfig::from_env`]
/// when no API key is configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirebaseConfig {
    pub api_key: String,
    pub identity_url: String,
    pub token_url: String,
}

impl FirebaseConfig {
    /// Load from `SENTINEL_FIREBASE_API_KEY`, `SENTINEL_IDENTITY_URL`, `SENTINEL_TOKEN_URL`.
    ///
    /// # Errors
    ///
    /// Returns an error if either endpoint override is not an http(s) URL.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(api_key) = std::env::var("SENTINEL_FIREBASE_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
        else {
            return Ok(None);
        };
        let identity_url = parse_url(
            "SENTINEL_IDENTITY_URL",
            std::env::var("SENTINEL_IDENTITY_URL").ok().as_deref(),
            DEFAULT_IDENTITY_URL,
        )?;
        let token_url = parse_url(
            "SENTINEL_TOKEN_URL",
            std::env::var("SENTINEL_TOKEN_URL").ok().as_deref(),
            DEFAULT_TOKEN_URL,
        )?;
        Ok(Some(Self { api_key, identity_url, token_url }))
    }
}

fn parse_url(var: &'static str, raw: Option<&str>, default: &str) -> Result<String, ConfigError> {
    let value = raw.map_or(default, str::trim).trim_end_matches('/');
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(value.to_string())
    } else {
        Err(ConfigError::InvalidUrl { var, value: value.to_string() })
    }
}

fn env_parse_u64(var: &'static str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidNumber { var, value: raw }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
