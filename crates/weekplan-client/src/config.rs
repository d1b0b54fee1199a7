//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/weekplan/config.toml` by default:
//!
//! ```toml
//! [connection]
//! url = "https://dav.example.com/"
//! username = "alice"
//! password = "pass::caldav/alice"
//! ```
//!
//! `password` only accepts a secret reference (see [`crate::secret`]).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use weekplan_caldav::CalDavConfig;

use crate::error::{ClientError, ClientResult};

/// Configuration for the weekplan client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server connection settings.
    pub connection: ConnectionSettings,
}

/// Where and how to reach the CalDAV server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    pub url: Option<String>,

    pub username: Option<String>,

    /// Secret reference (`pass::…` or `env::…`), never the password itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Skip TLS certificate verification.
    pub trust_all_certificates: bool,

    pub connect_timeout_secs: u64,

    pub request_timeout_secs: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            url: None,
            username: None,
            password: None,
            trust_all_certificates: false,
            connect_timeout_secs: CalDavConfig::DEFAULT_CONNECT_TIMEOUT_SECS,
            request_timeout_secs: CalDavConfig::DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl ConnectionSettings {
    /// Builds the transport configuration from these settings.
    pub fn caldav_config(&self) -> CalDavConfig {
        CalDavConfig::new()
            .with_connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .with_request_timeout(Duration::from_secs(self.request_timeout_secs))
            .with_trust_all_certificates(self.trust_all_certificates)
    }

    /// Resolves the configured password reference, if any.
    pub fn resolve_password(&self) -> ClientResult<Option<String>> {
        self.password
            .as_deref()
            .map(|reference| {
                crate::secret::resolve(reference)
                    .map_err(|e| ClientError::Config(format!("failed to resolve password: {}", e)))
            })
            .transpose()
    }
}

impl ClientConfig {
    /// Loads configuration from the default path, or defaults when the file
    /// does not exist.
    pub fn load() -> ClientResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    fn parse(content: &str) -> ClientResult<Self> {
        toml::from_str(content)
            .map_err(|e| ClientError::Config(format!("failed to parse config: {}", e)))
    }

    /// Checks values that parse but cannot work.
    pub fn validate(&self) -> ClientResult<()> {
        let connection = &self.connection;
        if connection
            .password
            .as_deref()
            .is_some_and(|reference| !crate::secret::is_reference(reference))
        {
            return Err(ClientError::Config(
                "connection.password must be a `pass::` or `env::` reference".to_string(),
            ));
        }
        if connection.connect_timeout_secs == 0 || connection.request_timeout_secs == 0 {
            return Err(ClientError::Config("timeouts must be at least one second".to_string()));
        }
        if connection.url.as_deref().is_some_and(|url| url.trim().is_empty()) {
            return Err(ClientError::Config("connection.url must not be empty".to_string()));
        }
        Ok(())
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("weekplan")
    }
}
