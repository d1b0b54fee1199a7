//! Client error types.

use thiserror::Error;
use weekplan_caldav::CalDavError;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Missing or invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The server or the connection failed.
    #[error("{0}")]
    CalDav(#[from] CalDavError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Output could not be produced.
    #[error("render error: {0}")]
    Render(String),
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Render(err.to_string())
    }
}
