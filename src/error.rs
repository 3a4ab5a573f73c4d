//! Error types for the catalog client

use reqwest::StatusCode;
use thiserror::Error;

/// How a UI layer is expected to surface an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayHint {
    /// Next to the offending form field
    InlineField,
    /// Banner or toast, session kept
    Banner,
    /// Session is gone, send the user to the login entry point
    Redirect,
}

/// Main client error type
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Login superseded by a newer attempt")]
    Superseded,
}

impl ClientError {
    /// Classify a non-success HTTP status returned by the API
    pub fn from_status(status: StatusCode, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
                ClientError::Validation(message)
            }
            StatusCode::UNAUTHORIZED => ClientError::Authentication(message),
            StatusCode::FORBIDDEN => ClientError::AccessDenied(message),
            StatusCode::NOT_FOUND => ClientError::NotFound(message),
            _ => ClientError::Server(format!("HTTP {}: {}", status.as_u16(), message)),
        }
    }

    pub fn display_hint(&self) -> DisplayHint {
        match self {
            ClientError::Validation(_) => DisplayHint::InlineField,
            ClientError::Authentication(_) => DisplayHint::Redirect,
            _ => DisplayHint::Banner,
        }
    }

    /// True when no response was received at all
    pub fn is_network(&self) -> bool {
        matches!(self, ClientError::Network(_))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ClientError::Server(format!("Malformed response payload: {}", e))
        } else if let Some(status) = e.status() {
            ClientError::from_status(status, e.to_string())
        } else {
            ClientError::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::Server(format!("Malformed response payload: {}", e))
    }
}

impl From<validator::ValidationErrors> for ClientError {
    fn from(e: validator::ValidationErrors) -> Self {
        ClientError::Validation(e.to_string())
    }
}

/// Result type alias for client operations
pub type ClientResult<T> = Result<T, ClientError>;
