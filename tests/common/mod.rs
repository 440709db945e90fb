//! Shared helpers for integration tests

#![allow(dead_code)]

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use campus_rs_client::{
    AuthClientConfig, AuthClientHttp, HttpTokenRefresher, LogoutHandler, Session, TokenStore,
};
use mockito::Server;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Unsigned JWT-shaped access token for `user_id`; `tag` keeps tokens distinct
pub fn access_token(user_id: i64, tag: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(
        serde_json::json!({ "token_type": "access", "user_id": user_id, "jti": tag }).to_string(),
    );
    format!("{header}.{payload}.{tag}")
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// Logout collaborator that counts its invocations
#[derive(Clone)]
pub struct CountingLogout {
    session: Session,
    calls: Arc<AtomicUsize>,
}

impl CountingLogout {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LogoutHandler for CountingLogout {
    fn logout(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.session.clear();
    }
}

pub type TestClient = AuthClientHttp<HttpTokenRefresher, CountingLogout>;

/// Client against `server` whose session starts from `store`
pub fn client_for(server: &Server, store: TokenStore) -> (Arc<TestClient>, CountingLogout) {
    let config = AuthClientConfig::new(&server.url()).expect("mock server URL is valid");
    client_with_config(config, store)
}

pub fn client_with_config(
    config: AuthClientConfig,
    store: TokenStore,
) -> (Arc<TestClient>, CountingLogout) {
    let http_client = reqwest::Client::new();
    let session = Session::restore(store);
    let refresher = HttpTokenRefresher::new(http_client.clone(), &config, session.store().clone())
        .expect("refresh endpoint is valid");
    let logout = CountingLogout {
        session: session.clone(),
        calls: Arc::new(AtomicUsize::new(0)),
    };

    let client = AuthClientHttp::with_parts(config, http_client, session, refresher, logout.clone());
    (client, logout)
}
