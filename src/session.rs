//! Process-wide authentication state
//!
//! [`Session`] is derived from the stored [`TokenPair`] when the client starts
//! and is changed only by login, a successful refresh, and logout. Everything
//! else reads it, either by snapshot ([`Session::current`]) or by watching it
//! ([`Session::subscribe`]) so that a forced logout reaches dependent state
//! without polling.

use crate::claims;
use crate::token_store::TokenStore;
use crate::types::TokenPair;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

/// Snapshot of who is logged in
///
/// `user_id` is present exactly when `access_token` is present and decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub user_id: Option<i64>,
    pub access_token: Option<String>,
}

impl SessionState {
    /// Derive the state from an access token; undecodable tokens give no identity
    pub fn from_access_token(token: &str) -> Self {
        match claims::user_id(token) {
            Some(user_id) => Self {
                user_id: Some(user_id),
                access_token: Some(token.to_string()),
            },
            None => Self::default(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }
}

/// Logout collaborator
///
/// Must clear the stored credentials and the session before returning.
pub trait LogoutHandler: Send + Sync + 'static {
    fn logout(&self);
}

/// Shared session handle; clones observe the same state
#[derive(Clone)]
pub struct Session {
    store: TokenStore,
    state: Arc<watch::Sender<SessionState>>,
}

impl Session {
    /// Build the session from whatever the store already holds
    pub fn restore(store: TokenStore) -> Self {
        let initial = store
            .access_token()
            .map(|access| SessionState::from_access_token(&access))
            .unwrap_or_default();

        debug!(user_id = ?initial.user_id, "Session restored from credential store");

        let (state, _) = watch::channel(initial);
        Self {
            store,
            state: Arc::new(state),
        }
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    pub fn current(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn user_id(&self) -> Option<i64> {
        self.state.borrow().user_id
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    /// Watch session changes
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Persist `tokens` and publish the identity they carry
    ///
    /// Used by login and by a successful refresh.
    pub fn establish(&self, tokens: &TokenPair) {
        self.store.save(tokens);
        let next = SessionState::from_access_token(&tokens.access);
        debug!(user_id = ?next.user_id, "Session established");
        self.state.send_replace(next);
    }

    /// Drop the stored tokens and publish an empty session
    pub fn clear(&self) {
        self.store.clear();
        self.state.send_replace(SessionState::default());
    }
}

impl LogoutHandler for Session {
    fn logout(&self) {
        info!(user_id = ?self.user_id(), "Logging out");
        self.clear();
    }
}
