//! Error types for polling and command submission.

use thiserror::Error;

/// Errors that can occur while fetching or parsing one document.
///
/// These never cross the accessor boundary directly: the poller turns them
/// into its sticky error state and accessors report a [`CommunicationError`].
#[derive(Debug, Error)]
pub enum PollError {
    /// The request URL could not be used.
    #[error("Invalid request URL '{0}'")]
    InvalidUrl(String),

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The daemon answered with a non-success status.
    #[error("Daemon returned status {0}")]
    Status(u16),

    /// Connection failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Timeout waiting for response.
    #[error("Request timed out")]
    Timeout,

    /// The response body is not a well-formed XML document.
    #[error("Failed to parse response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for PollError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PollError::Timeout
        } else if err.is_connect() {
            PollError::Connection(err.to_string())
        } else if err.is_builder() {
            PollError::InvalidUrl(
                err.url()
                    .map(|url| url.to_string())
                    .unwrap_or_else(|| err.to_string()),
            )
        } else {
            PollError::Http(err.to_string())
        }
    }
}

impl From<roxmltree::Error> for PollError {
    fn from(err: roxmltree::Error) -> Self {
        PollError::Parse(err.to_string())
    }
}

/// The last poll failed and no poll has succeeded since.
///
/// Returned by every read accessor so callers can tell "unreachable daemon"
/// apart from "valid but empty data".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Communication error: {message}")]
pub struct CommunicationError {
    pub message: String,
}

impl CommunicationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors of the nonce handshake and command submission.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Fetching the nonce or posting the command failed.
    #[error(transparent)]
    Poll(#[from] PollError),

    /// The daemon could not be reached or its answer was unusable.
    #[error(transparent)]
    Communication(#[from] CommunicationError),

    /// The nonce response lacked a usable `id` or `nonce`.
    #[error("Invalid nonce response: {0}")]
    InvalidNonce(String),
}
