//! Error types for CalDAV operations.
//!
//! Every failure surfaces as a single [`CalDavError`] whose [`CalDavErrorCode`]
//! tells the caller what went wrong. Only [`CalDavErrorCode::AccessDenied`]
//! drives any automatic behaviour (the free-busy fallback when fetching a
//! user's week).

use std::fmt;
use thiserror::Error;

/// The category of a CalDAV error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CalDavErrorCode {
    /// Blank connection field or search term, raised before any I/O.
    Validation,
    /// The server answered 401.
    Authentication,
    /// The server answered 403.
    AccessDenied,
    /// The server answered 404.
    NotFound,
    /// Any other status, a network failure or timeout, or malformed XML.
    Protocol,
    /// Well-formed content the parser could not interpret.
    Parse,
}

impl CalDavErrorCode {
    /// Returns a stable machine-readable name for this error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Authentication => "authentication",
            Self::AccessDenied => "access_denied",
            Self::NotFound => "not_found",
            Self::Protocol => "protocol",
            Self::Parse => "parse",
        }
    }
}

impl fmt::Display for CalDavErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error that occurred while talking to a CalDAV server.
#[derive(Debug, Error)]
pub struct CalDavError {
    code: CalDavErrorCode,
    /// Human-readable message, suitable for showing to the user as is.
    message: String,
    /// HTTP status that caused the error, if any.
    status: Option<u16>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl CalDavError {
    pub fn new(code: CalDavErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status: None,
            source: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(CalDavErrorCode::Validation, message)
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(CalDavErrorCode::Authentication, message).with_status(401)
    }

    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::new(CalDavErrorCode::AccessDenied, message).with_status(403)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(CalDavErrorCode::NotFound, message).with_status(404)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(CalDavErrorCode::Protocol, message)
    }

    /// A protocol error for a status the caller did not expect.
    pub fn unexpected_status(status: u16) -> Self {
        Self::protocol(format!("Server returned unexpected status {}.", status)).with_status(status)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(CalDavErrorCode::Parse, message)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Sets the underlying cause.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn code(&self) -> CalDavErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Returns true for a 403 answer, the only error that triggers the
    /// free-busy fallback.
    pub fn is_access_denied(&self) -> bool {
        self.code == CalDavErrorCode::AccessDenied
    }
}

impl fmt::Display for CalDavError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// A specialized Result type for CalDAV operations.
pub type CalDavResult<T> = Result<T, CalDavError>;
