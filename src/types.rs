//! Type definitions for authentication

use crate::error::RefreshFailure;
use serde::{Deserialize, Serialize};

/// Authentication tokens (access + refresh)
///
/// Persisted as a unit; there is no way to update one half alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

impl TokenPair {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: access.into(),
            refresh: refresh.into(),
        }
    }
}

/// Result of one refresh exchange, shared by every caller that waited on it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Success(TokenPair),
    Failure(RefreshFailure),
}

/// Where a logical request stands in the refresh protocol
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HandlerState {
    /// Response handed back as is
    #[default]
    Passthrough,
    /// Waiting on the refresh flight
    Refreshing,
    /// Resending with the refreshed token
    Retrying,
    /// Refresh failed; session torn down
    LoggedOut,
}

/// Per logical request bookkeeping
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Set once the request has been through a refresh; a second 401 is terminal
    pub retried: bool,
    /// Access token attached to the latest attempt
    pub sent_token: Option<String>,
    pub state: HandlerState,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context for an attempt sent with `token`
    pub fn sent_with(token: impl Into<String>) -> Self {
        Self {
            sent_token: Some(token.into()),
            ..Self::default()
        }
    }
}
