//! Single-flight token refresh

use crate::config::AuthClientConfig;
use crate::error::{ClientError, RefreshFailure, Result};
use crate::session::Session;
use crate::token_store::TokenStore;
use crate::types::{RefreshOutcome, TokenPair};
use async_singleflight::Group;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::{debug, info, warn};
use url::Url;

/// All refreshes share one flight; there is only one session to refresh
const REFRESH_FLIGHT_KEY: &str = "session";

/// Refresh collaborator
///
/// Exchanges the stored refresh token for a new pair. `Ok(None)` means the
/// exchange completed but produced nothing usable.
pub trait TokenRefresher: Send + Sync + 'static {
    fn refresh_access_token(&self) -> impl Future<Output = Result<Option<TokenPair>>> + Send;
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

/// Response of the refresh endpoint
///
/// `refresh` is only present when the backend rotates refresh tokens.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
    #[serde(default)]
    refresh: Option<String>,
}

/// Refresh collaborator talking to the backend refresh endpoint
pub struct HttpTokenRefresher {
    http_client: Client,
    url: Url,
    store: TokenStore,
}

impl HttpTokenRefresher {
    pub fn new(http_client: Client, config: &AuthClientConfig, store: TokenStore) -> Result<Self> {
        Ok(Self {
            http_client,
            url: config.endpoint(&config.refresh_path)?,
            store,
        })
    }
}

impl TokenRefresher for HttpTokenRefresher {
    async fn refresh_access_token(&self) -> Result<Option<TokenPair>> {
        let Some(refresh_token) = self.store.refresh_token() else {
            debug!("No refresh token stored, nothing to refresh");
            return Ok(None);
        };

        let response = self
            .http_client
            .post(self.url.clone())
            .json(&RefreshRequest {
                refresh: &refresh_token,
            })
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            warn!(status = %status, "Refresh token rejected");
            return Ok(None);
        }

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ClientError::Authentication(format!(
                "Refresh request failed with status {status}: {text}"
            )));
        }

        let body: RefreshResponse = response.json().await?;
        Ok(Some(TokenPair {
            access: body.access,
            refresh: body.refresh.unwrap_or(refresh_token),
        }))
    }
}

/// Collapses concurrent refresh requests into one exchange
///
/// The first caller runs the refresh collaborator; callers that arrive while it
/// is in flight wait for it and receive the same [`RefreshOutcome`]. Once the
/// exchange settles the flight is cleared, so a later expiry refreshes again.
pub struct RefreshCoordinator<R> {
    refresher: R,
    session: Session,
    /// Errors are folded into the outcome: the group only hands errors to the owner
    flights: Group<RefreshOutcome, ()>,
}

impl<R: TokenRefresher> RefreshCoordinator<R> {
    pub fn new(refresher: R, session: Session) -> Self {
        Self {
            refresher,
            session,
            flights: Group::new(),
        }
    }

    pub fn refresher(&self) -> &R {
        &self.refresher
    }

    /// Obtain a new token pair, sharing any exchange already in flight
    ///
    /// On success the pair is persisted and the session updated. On failure
    /// nothing is touched; tearing the session down is the caller's decision.
    pub async fn refresh(&self) -> RefreshOutcome {
        self.refresh_after(None, || {}).await
    }

    /// Refresh on behalf of a request whose access token `rejected` was refused
    ///
    /// When the store no longer holds `rejected`, an earlier flight has already
    /// settled: a different token means it succeeded, an empty store means it
    /// failed. That outcome is returned without exchanging again. The store is
    /// checked before joining the flight and once more inside it.
    ///
    /// `on_failure` runs inside the flight, only when this call performed an
    /// exchange and it failed. Later callers therefore observe its effects.
    pub async fn refresh_after(&self, rejected: Option<&str>, on_failure: impl FnOnce()) -> RefreshOutcome {
        if let Some(settled) = self.settled_since(rejected) {
            debug!("Refresh already settled for this token");
            return settled;
        }

        let (outcome, _, owner) = self
            .flights
            .work(REFRESH_FLIGHT_KEY, async move {
                if let Some(settled) = self.settled_since(rejected) {
                    return Ok(settled);
                }
                let outcome = self.exchange().await;
                if matches!(outcome, RefreshOutcome::Failure(_)) {
                    on_failure();
                }
                Ok(outcome)
            })
            .await;

        debug!(owner = owner, "Refresh flight settled");

        outcome.unwrap_or_else(|| {
            RefreshOutcome::Failure(RefreshFailure::Errored(
                "Refresh was abandoned before completing".to_string(),
            ))
        })
    }

    fn settled_since(&self, rejected: Option<&str>) -> Option<RefreshOutcome> {
        let rejected = rejected?;
        match self.session.store().load() {
            Some(tokens) if tokens.access != rejected => Some(RefreshOutcome::Success(tokens)),
            Some(_) => None,
            None => Some(RefreshOutcome::Failure(RefreshFailure::NoTokens)),
        }
    }

    async fn exchange(&self) -> RefreshOutcome {
        match self.refresher.refresh_access_token().await {
            Ok(Some(tokens)) => {
                self.session.establish(&tokens);
                info!(user_id = ?self.session.user_id(), "Access token refreshed successfully");
                RefreshOutcome::Success(tokens)
            }
            Ok(None) => {
                warn!("Token refresh returned no tokens");
                RefreshOutcome::Failure(RefreshFailure::NoTokens)
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed");
                RefreshOutcome::Failure(RefreshFailure::Errored(e.to_string()))
            }
        }
    }
}
