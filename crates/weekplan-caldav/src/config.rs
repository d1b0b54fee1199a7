//! Connection and transport configuration.

use std::fmt;
use std::time::Duration;

use tracing::warn;

use crate::error::{CalDavError, CalDavResult};

/// Server location and credentials for one session.
///
/// Held in memory only; `Debug` output never shows the password.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// Base URL as typed by the user; normalized before use.
    pub url: String,
    pub username: String,
    pub password: String,
}

impl ConnectionInfo {
    pub fn new(
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    /// Checks that no field is blank.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the first blank field.
    pub fn validate(&self) -> CalDavResult<()> {
        if self.url.trim().is_empty() {
            return Err(CalDavError::validation("CalDAV URL must not be empty."));
        }
        if self.username.trim().is_empty() {
            return Err(CalDavError::validation("Username must not be empty."));
        }
        if self.password.is_empty() {
            return Err(CalDavError::validation("Password must not be empty."));
        }
        Ok(())
    }
}

impl fmt::Debug for ConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionInfo")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Configuration for the HTTP transport.
#[derive(Debug, Clone)]
pub struct CalDavConfig {
    /// Maximum time to establish a connection.
    pub connect_timeout: Duration,
    /// Maximum time for a whole request, including reading the body.
    pub request_timeout: Duration,
    /// Accept any TLS certificate. For self-signed test servers only.
    pub trust_all_certificates: bool,
    pub user_agent: String,
}

impl CalDavConfig {
    pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
    pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

    pub fn new() -> Self {
        Self {
            connect_timeout: Duration::from_secs(Self::DEFAULT_CONNECT_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(Self::DEFAULT_REQUEST_TIMEOUT_SECS),
            trust_all_certificates: false,
            user_agent: format!("weekplan/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Disables certificate verification.
    pub fn with_trust_all_certificates(mut self, trust_all: bool) -> Self {
        if trust_all {
            warn!("TLS certificate verification is disabled; use only against test servers");
        }
        self.trust_all_certificates = trust_all;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

impl Default for CalDavConfig {
    fn default() -> Self {
        Self::new()
    }
}
