//! Authenticated API client with transparent token refresh

use crate::config::AuthClientConfig;
use crate::error::{ClientError, Result};
use crate::refresh::{HttpTokenRefresher, RefreshCoordinator, TokenRefresher};
use crate::session::{LogoutHandler, Session, SessionState};
use crate::token_store::TokenStore;
use crate::types::*;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::{Client, Method, Request, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Macro to check HTTP response status and return error if not successful
macro_rules! check_response {
    ($response:expr, $error_msg:expr) => {
        if !$response.status().is_success() {
            let status = $response.status();
            let text = $response.text().await.unwrap_or_default();
            return Err(ClientError::Authentication(format!(
                "{} with status {}: {}",
                $error_msg, status, text
            )));
        }
    };
}

/// Base API client trait
///
/// Builds requests rooted at the configured base URL and runs them.
/// Implementations return `Ok` only for 2xx responses.
pub trait ApiClient: Send + Sync + 'static {
    fn config(&self) -> &AuthClientConfig;

    fn http_client(&self) -> &Client;

    /// Run a built request
    fn execute(&self, request: Request) -> impl Future<Output = Result<Response>> + Send;

    /// Start a request for `path`, relative to the base URL
    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        Ok(self.http_client().request(method, self.config().endpoint(path)?))
    }

    fn get(&self, path: &str) -> Result<RequestBuilder> {
        self.request(Method::GET, path)
    }

    fn post(&self, path: &str) -> Result<RequestBuilder> {
        self.request(Method::POST, path)
    }

    fn put(&self, path: &str) -> Result<RequestBuilder> {
        self.request(Method::PUT, path)
    }

    fn patch(&self, path: &str) -> Result<RequestBuilder> {
        self.request(Method::PATCH, path)
    }

    fn delete(&self, path: &str) -> Result<RequestBuilder> {
        self.request(Method::DELETE, path)
    }

    /// Build and run a request
    fn send(&self, builder: RequestBuilder) -> impl Future<Output = Result<Response>> + Send {
        async move {
            let request = builder.build()?;
            self.execute(request).await
        }
    }
}

/// Client for public endpoints; never attaches credentials
pub struct PublicClient {
    config: AuthClientConfig,
    http_client: Client,
}

impl PublicClient {
    pub fn new(config: AuthClientConfig) -> Arc<Self> {
        Self::with_http_client(config, Client::new())
    }

    pub fn with_http_client(config: AuthClientConfig, http_client: Client) -> Arc<Self> {
        Arc::new(Self {
            config,
            http_client,
        })
    }
}

impl ApiClient for PublicClient {
    fn config(&self) -> &AuthClientConfig {
        &self.config
    }

    fn http_client(&self) -> &Client {
        &self.http_client
    }

    async fn execute(&self, request: Request) -> Result<Response> {
        let response = self.http_client.execute(request).await?;
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(ClientError::RequestFailed { status })
        }
    }
}

/// Set `Authorization: Bearer <token>`; returns false if the token cannot form a header
fn set_bearer(request: &mut Request, token: &str) -> bool {
    match HeaderValue::from_str(&format!("Bearer {token}")) {
        Ok(mut value) => {
            value.set_sensitive(true);
            request.headers_mut().insert(AUTHORIZATION, value);
            true
        }
        Err(e) => {
            warn!(error = %e, "Access token is not a valid header value, sending unauthenticated");
            false
        }
    }
}

/// Pre-request hook attaching the stored access token
///
/// A missing token is not an error here; the backend will answer 401.
#[derive(Clone)]
pub struct RequestAuthenticator {
    store: TokenStore,
}

impl RequestAuthenticator {
    pub fn new(store: TokenStore) -> Self {
        Self { store }
    }

    /// Attach the current access token, returning the token attached
    pub fn attach(&self, request: &mut Request) -> Option<String> {
        let token = self.store.access_token()?;
        set_bearer(request, &token).then_some(token)
    }
}

/// Decision for a received response
#[derive(Debug)]
pub enum Verdict {
    /// Return the response to the caller
    Deliver,
    /// Credential expired on a first attempt; refresh and retry
    Refresh,
    /// Terminal failure
    Fail(ClientError),
}

/// Post-response hook driving refresh, retry and forced logout
pub struct ResponseRefreshHandler<R, L> {
    coordinator: RefreshCoordinator<R>,
    logout: L,
    store: TokenStore,
}

impl<R: TokenRefresher, L: LogoutHandler> ResponseRefreshHandler<R, L> {
    pub fn new(coordinator: RefreshCoordinator<R>, logout: L, store: TokenStore) -> Self {
        Self {
            coordinator,
            logout,
            store,
        }
    }

    pub fn coordinator(&self) -> &RefreshCoordinator<R> {
        &self.coordinator
    }

    pub fn logout_handler(&self) -> &L {
        &self.logout
    }

    /// Classify a response status for a request in `ctx`
    ///
    /// A request that has already been through a refresh never refreshes again.
    pub fn classify(ctx: &RequestContext, status: StatusCode) -> Verdict {
        if status == StatusCode::UNAUTHORIZED {
            if ctx.retried {
                Verdict::Fail(ClientError::RetryExhausted)
            } else {
                Verdict::Refresh
            }
        } else if status.is_success() {
            Verdict::Deliver
        } else {
            Verdict::Fail(ClientError::RequestFailed { status })
        }
    }

    /// Obtain an access token to retry with after a 401
    ///
    /// Marks the request as retried. If the token this request was sent with
    /// has already been replaced or cleared by a settled refresh, that outcome
    /// is reused without a new exchange. The logout collaborator runs once per
    /// failed exchange and the caller gets [`ClientError::RefreshFailed`].
    pub async fn recover(&self, ctx: &mut RequestContext) -> Result<String> {
        ctx.retried = true;

        if ctx.sent_token.is_none() {
            if let Some(current) = self.store.access_token() {
                ctx.state = HandlerState::Retrying;
                debug!(state = ?ctx.state, "Session established since the request was sent");
                return Ok(current);
            }
        }

        ctx.state = HandlerState::Refreshing;
        debug!(state = ?ctx.state, "Credential expired, refreshing");
        let outcome = self
            .coordinator
            .refresh_after(ctx.sent_token.as_deref(), || self.logout.logout())
            .await;

        match outcome {
            RefreshOutcome::Success(tokens) => {
                ctx.state = HandlerState::Retrying;
                debug!(state = ?ctx.state, "Retrying with refreshed token");
                Ok(tokens.access)
            }
            RefreshOutcome::Failure(reason) => {
                ctx.state = HandlerState::LoggedOut;
                warn!(state = ?ctx.state, reason = %reason, "Session expired");
                Err(ClientError::RefreshFailed(reason))
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Authenticated client with automatic token refresh
///
/// Every request carries the stored access token. A 401 triggers one shared
/// refresh and a single retry; when no new token can be obtained the session
/// is logged out and the caller gets a terminal error.
pub struct AuthClientHttp<R = HttpTokenRefresher, L = Session> {
    config: AuthClientConfig,
    http_client: Client,
    session: Session,
    authenticator: RequestAuthenticator,
    handler: ResponseRefreshHandler<R, L>,
}

impl AuthClientHttp {
    /// Create a client refreshing against the configured backend
    ///
    /// The session is restored from the configured credential store.
    pub fn new(config: AuthClientConfig) -> Result<Arc<Self>> {
        let http_client = Client::new();
        let session = Session::restore(config.open_store());
        let refresher =
            HttpTokenRefresher::new(http_client.clone(), &config, session.store().clone())?;

        Ok(Self::with_parts(
            config,
            http_client,
            session.clone(),
            refresher,
            session,
        ))
    }
}

impl<R: TokenRefresher, L: LogoutHandler> AuthClientHttp<R, L> {
    /// Assemble a client from explicit collaborators
    pub fn with_parts(
        config: AuthClientConfig,
        http_client: Client,
        session: Session,
        refresher: R,
        logout: L,
    ) -> Arc<Self> {
        let store = session.store().clone();
        let coordinator = RefreshCoordinator::new(refresher, session.clone());

        Arc::new(Self {
            config,
            http_client,
            authenticator: RequestAuthenticator::new(store.clone()),
            handler: ResponseRefreshHandler::new(coordinator, logout, store),
            session,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn handler(&self) -> &ResponseRefreshHandler<R, L> {
        &self.handler
    }

    /// Exchange credentials for a token pair and start a session
    pub async fn login(&self, email: &str, password: &str) -> Result<SessionState> {
        let url = self.config.endpoint(&self.config.token_path)?;

        let response = self
            .http_client
            .post(url)
            .json(&LoginRequest { email, password })
            .send()
            .await?;

        check_response!(response, "Login failed");

        let tokens: TokenPair = response.json().await?;
        self.session.establish(&tokens);

        let state = self.session.current();
        info!(user_id = ?state.user_id, "Logged in");
        Ok(state)
    }

    /// End the session through the logout collaborator
    pub fn logout(&self) {
        self.handler.logout.logout();
    }
}

impl<R: TokenRefresher, L: LogoutHandler> ApiClient for AuthClientHttp<R, L> {
    fn config(&self) -> &AuthClientConfig {
        &self.config
    }

    fn http_client(&self) -> &Client {
        &self.http_client
    }

    async fn execute(&self, request: Request) -> Result<Response> {
        let mut ctx = RequestContext::new();
        // Streaming bodies cannot be resent
        let mut replay = request.try_clone();

        let mut attempt = request;
        ctx.sent_token = self.authenticator.attach(&mut attempt);

        loop {
            let method = attempt.method().clone();
            let url = attempt.url().clone();
            let response = self.http_client.execute(attempt).await?;

            match ResponseRefreshHandler::<R, L>::classify(&ctx, response.status()) {
                Verdict::Deliver => return Ok(response),
                Verdict::Fail(e) => {
                    debug!(method = %method, url = %url, status = %response.status(), state = ?ctx.state, error = %e, "Request failed");
                    return Err(e);
                }
                Verdict::Refresh => {
                    let access = self.handler.recover(&mut ctx).await?;
                    let Some(mut next) = replay.take() else {
                        warn!(method = %method, url = %url, "Cannot replay request body after refresh");
                        return Err(ClientError::UnreplayableRequest);
                    };

                    ctx.sent_token = set_bearer(&mut next, &access).then_some(access);
                    attempt = next;
                }
            }
        }
    }
}
