//! Portal client configuration parsed from environment variables.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// File name of the persisted bearer token inside the portal home directory.
pub const TOKEN_FILE_NAME: &str = "auth_token";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {var}: {value:?} is not an http(s) URL")]
    InvalidUrl { var: &'static str, value: String },
    #[error("invalid {var}: {value:?} is not a whole number of seconds")]
    InvalidTimeout { var: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortalTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl PortalTimeouts {
    #[must_use]
    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    #[must_use]
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }
}

impl Default for PortalTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalConfig {
    /// Backend API root, without a trailing slash.
    pub api_base_url: String,
    /// Root used when building public document links, without a trailing slash.
    pub public_base_url: String,
    /// Directory holding the persisted token file.
    pub home_dir: PathBuf,
    pub timeouts: PortalTimeouts,
}

impl PortalConfig {
    /// Config pointing at `api_base_url` with every other setting at its default.
    ///
    /// # Errors
    ///
    /// Returns an error if `api_base_url` is not an http(s) URL.
    pub fn new(api_base_url: &str) -> Result<Self, ConfigError> {
        let api_base_url = parse_url("PORTAL_API_URL", api_base_url)?;
        Ok(Self {
            public_base_url: api_base_url.clone(),
            api_base_url,
            home_dir: default_home_dir(),
            timeouts: PortalTimeouts::default(),
        })
    }

    /// Build typed config from environment variables.
    ///
    /// Optional:
    /// - `PORTAL_API_URL`: default `http://127.0.0.1:8000`
    /// - `PORTAL_PUBLIC_URL`: defaults to the API URL
    /// - `PORTAL_HOME`: defaults to `<config dir>/docportal`
    /// - `PORTAL_REQUEST_TIMEOUT_SECS`: default 30
    /// - `PORTAL_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns an error if a URL or timeout variable is malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Same as [`PortalConfig::from_env`] over an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a URL or timeout variable is malformed.
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_base_url =
            parse_url("PORTAL_API_URL", lookup("PORTAL_API_URL").as_deref().unwrap_or(DEFAULT_API_URL))?;
        let public_base_url = match lookup("PORTAL_PUBLIC_URL") {
            Some(raw) => parse_url("PORTAL_PUBLIC_URL", &raw)?,
            None => api_base_url.clone(),
        };
        let home_dir = lookup("PORTAL_HOME").map_or_else(default_home_dir, PathBuf::from);
        let timeouts = PortalTimeouts {
            request_secs: parse_secs(
                "PORTAL_REQUEST_TIMEOUT_SECS",
                lookup("PORTAL_REQUEST_TIMEOUT_SECS"),
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?,
            connect_secs: parse_secs(
                "PORTAL_CONNECT_TIMEOUT_SECS",
                lookup("PORTAL_CONNECT_TIMEOUT_SECS"),
                DEFAULT_CONNECT_TIMEOUT_SECS,
            )?,
        };

        Ok(Self { api_base_url, public_base_url, home_dir, timeouts })
    }

    /// Path of the persisted token file.
    #[must_use]
    pub fn token_path(&self) -> PathBuf {
        self.home_dir.join(TOKEN_FILE_NAME)
    }
}

fn default_home_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("docportal")
}

fn parse_url(var: &'static str, raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let valid = ["http://", "https://"]
        .iter()
        .any(|scheme| trimmed.len() > scheme.len() && trimmed.starts_with(scheme));
    if !valid {
        return Err(ConfigError::InvalidUrl { var, value: raw.to_owned() });
    }
    Ok(trimmed.to_owned())
}

fn parse_secs(var: &'static str, raw: Option<String>, default: u64) -> Result<u64, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidTimeout { var, value }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
