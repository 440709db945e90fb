//! Structural decoding of access token claims
//!
//! The payload segment of the access token is base64url-decoded and parsed as
//! JSON. Neither the signature nor the expiry is checked: the backend verifies
//! both on every authenticated call, so the decoded claims are only good for
//! display (who is logged in) and must never gate access to anything.

use base64::Engine;
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use serde::Deserialize;
use thiserror::Error;

/// Claims read from an access token
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Claims {
    /// Authenticated user's identifier
    pub user_id: i64,
    /// Expiry as Unix timestamp, when the issuer includes one
    #[serde(default)]
    pub exp: Option<i64>,
}

/// Failure to decode an access token
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("token must have three dot-separated segments, found {0}")]
    Malformed(usize),

    #[error("payload is not valid base64url: {0}")]
    Base64(String),

    #[error("payload is not a valid claims object: {0}")]
    Json(String),
}

/// Decode the claims of `token` without verifying it
pub fn decode(token: &str) -> Result<Claims, DecodeError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(DecodeError::Malformed(segments.len()));
    }

    let payload = segments[1];
    // Some issuers keep the '=' padding
    let engine = if payload.ends_with('=') {
        &URL_SAFE
    } else {
        &URL_SAFE_NO_PAD
    };
    let bytes = engine
        .decode(payload)
        .map_err(|e| DecodeError::Base64(e.to_string()))?;

    serde_json::from_slice(&bytes).map_err(|e| DecodeError::Json(e.to_string()))
}

/// Decode only the user id, treating any failure as "no identity"
pub fn user_id(token: &str) -> Option<i64> {
    match decode(token) {
        Ok(claims) => Some(claims.user_id),
        Err(e) => {
            tracing::debug!(error = %e, "Access token carries no decodable identity");
            None
        }
    }
}

/// Build an unsigned token carrying `payload` (test helper)
#[cfg(test)]
pub(crate) fn encode_unsigned(payload: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{header}.{body}.signature")
}
