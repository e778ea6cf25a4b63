// common/src/error.rs
use thiserror::Error;

pub const DEFAULT_HANDOFF_FAILURE: &str = "Extension failed to store token";
pub const HANDOFF_TIMEOUT_MESSAGE: &str =
    "Extension did not respond. Make sure it is installed and enabled.";

/// Failure taxonomy shared by the server routes and the clients
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Unauthorized")]
    Unauthenticated,

    #[error("Could not retrieve token")]
    TokenUnavailable,

    #[error("{message}")]
    BackendRequestFailed {
        status: Option<u16>,
        message: String,
    },

    #[error(transparent)]
    ExtensionHandoffFailed(#[from] HandoffFailure),

    #[error("{0}")]
    ValidationFailed(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Protocol violation: {0}")]
    Protocol(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Ways a token handoff to the extension can end without success
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandoffFailure {
    /// The extension answered with `success: false`
    #[error("{0}")]
    Rejected(String),

    #[error("{}", HANDOFF_TIMEOUT_MESSAGE)]
    TimedOut,
}

impl AppError {
    pub fn backend(status: Option<u16>, message: impl Into<String>) -> Self {
        AppError::BackendRequestFailed {
            status,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        AppError::ValidationFailed(message.into())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Protocol(e.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        AppError::Internal(format!("token signing failed: {}", e))
    }
}
