//! SD-005: Client configuration. Endpoint, retry budget, timeouts.
//!
//! Values come from (highest first) command-line flags, the `SYSDELTA_URL`
//! environment variable, an optional YAML file, and built-in defaults.

use crate::transport::http::HttpConnector;
use crate::transport::Endpoint;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the default endpoint.
pub const URL_ENV: &str = "SYSDELTA_URL";

/// Fatal configuration problems.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("'{input}' is not a valid URL.")]
    InvalidUrl { input: String },

    #[error("cannot read {}: {message}", .path.display())]
    Read { path: PathBuf, message: String },

    #[error("invalid config {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },
}

/// Connection settings for the provisioning API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// API endpoint URL
    #[serde(default = "default_url")]
    pub url: String,

    /// Retries after the first attempt on transport failure
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
}

fn default_url() -> String {
    "http://localhost/cobbler_api".to_string()
}

fn default_max_retries() -> u32 {
    5
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_read_timeout() -> u64 {
    30
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            max_retries: default_max_retries(),
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
        }
    }
}

/// Command-line overrides; `None` leaves the lower layer in place.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub url: Option<String>,
    pub max_retries: Option<u32>,
}

impl ClientConfig {
    /// Parse a YAML config document.
    pub fn from_yaml(yaml: &str) -> Result<Self, String> {
        serde_yaml_ng::from_str(yaml).map_err(|e| format!("YAML parse error: {}", e))
    }

    /// Load a YAML config file.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_yaml(&content).map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Layer file, environment and flags over the defaults.
    pub fn resolve(
        file: Option<&Path>,
        env_url: Option<String>,
        overrides: &Overrides,
    ) -> Result<Self, ConfigError> {
        let mut config = match file {
            Some(path) => Self::load_file(path)?,
            None => Self::default(),
        };
        if let Some(url) = env_url.filter(|u| !u.trim().is_empty()) {
            config.url = url;
        }
        if let Some(url) = &overrides.url {
            config.url.clone_from(url);
        }
        if let Some(n) = overrides.max_retries {
            config.max_retries = n;
        }
        config.endpoint()?;
        Ok(config)
    }

    /// Parsed endpoint; fails with a message naming the offending input.
    pub fn endpoint(&self) -> Result<Endpoint, ConfigError> {
        Endpoint::parse(&self.url)
    }

    pub fn connector(&self) -> HttpConnector {
        HttpConnector {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            read_timeout: Duration::from_secs(self.read_timeout_secs),
        }
    }
}
