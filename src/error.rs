//! Error types for the campus client

use crate::claims::DecodeError;
use reqwest::StatusCode;
use thiserror::Error;

/// Reason a token refresh produced no usable credential
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshFailure {
    /// The refresh collaborator answered without a token pair
    #[error("no tokens returned")]
    NoTokens,

    /// The refresh call itself errored
    #[error("{0}")]
    Errored(String),
}

impl RefreshFailure {
    fn detail(&self) -> &'static str {
        match self {
            RefreshFailure::NoTokens => " (no tokens returned)",
            RefreshFailure::Errored(_) => "",
        }
    }
}

/// Client error types
///
/// Callers above the client only ever see a terminal failure of their own call;
/// the refresh machinery is reported through [`ClientError::RefreshFailed`] and
/// [`ClientError::RetryExhausted`] without exposing its internals.
#[derive(Error, Debug)]
pub enum ClientError {
    /// No HTTP response at all (connect, DNS, timeout, body read)
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Request or response body is not the expected JSON
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Access token payload could not be decoded
    #[error("Token decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Login or refresh endpoint rejected the exchange
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Refresh failed and the session was torn down
    #[error("Token refresh failed{}", .0.detail())]
    RefreshFailed(RefreshFailure),

    /// The post-refresh retry was rejected with 401 again
    #[error("Request failed")]
    RetryExhausted,

    /// Non-2xx, non-401 response
    #[error("Request failed")]
    RequestFailed { status: StatusCode },

    /// A 401 arrived for a request whose body cannot be resent
    #[error("Request failed: body cannot be replayed after token refresh")]
    UnreplayableRequest,

    /// Invalid base URL or endpoint path
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ClientError {
    /// HTTP status that caused the failure, when one was received
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::RequestFailed { status } => Some(*status),
            ClientError::RetryExhausted => Some(StatusCode::UNAUTHORIZED),
            ClientError::Transport(e) => e.status(),
            _ => None,
        }
    }

    /// True when the failure ended the session and the user must log in again
    pub fn is_session_expired(&self) -> bool {
        matches!(self, ClientError::RefreshFailed(_))
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
