//! Campus Rust Client
//!
//! An authenticated REST client for the campus marketplace backend, with
//! bearer token attachment, single-flight token refresh, one retry per
//! request, and forced logout when the session cannot be renewed.

pub mod auth_client;
pub mod claims;
pub mod config;
pub mod error;
pub mod refresh;
pub mod session;
pub mod token_store;
pub mod types;

pub use auth_client::{
    ApiClient, AuthClientHttp, PublicClient, RequestAuthenticator,
    ResponseRefreshHandler, Verdict,
};
pub use claims::{Claims, DecodeError};
pub use config::AuthClientConfig;
pub use error::{ClientError, RefreshFailure, Result};
pub use refresh::{HttpTokenRefresher, RefreshCoordinator, TokenRefresher};
pub use session::{LogoutHandler, Session, SessionState};
pub use token_store::{CredentialBackend, FileBackend, MemoryBackend, TokenStore};
pub use types::{HandlerState, RefreshOutcome, RequestContext, TokenPair};
