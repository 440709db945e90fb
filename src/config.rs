//! Client configuration

use crate::error::{ClientError, Result};
use crate::token_store::{DEFAULT_STORAGE_KEY, FileBackend, MemoryBackend, TokenStore};
use std::path::PathBuf;
use url::Url;

/// Base URL used when `CAMPUS_BASE_URL` is not set
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Configuration for the authenticated client
#[derive(Debug, Clone)]
pub struct AuthClientConfig {
    /// Backend root; request paths are resolved against it
    pub base_url: Url,

    /// Login endpoint, relative to `base_url`
    /// Default: "token/"
    pub token_path: String,

    /// Refresh endpoint, relative to `base_url`
    /// Default: "token/refresh/"
    pub refresh_path: String,

    /// Key the token pair is stored under
    /// Default: "tokens"
    pub storage_key: String,

    /// Directory for persisted credentials; `None` keeps them in memory
    pub credentials_dir: Option<PathBuf>,
}

impl AuthClientConfig {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            token_path: "token/".to_string(),
            refresh_path: "token/refresh/".to_string(),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            credentials_dir: None,
        })
    }

    /// Read `CAMPUS_BASE_URL` and `CAMPUS_CREDENTIALS_DIR`
    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var("CAMPUS_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let mut config = Self::new(&base_url)?;
        config.credentials_dir = std::env::var_os("CAMPUS_CREDENTIALS_DIR").map(PathBuf::from);
        Ok(config)
    }

    pub fn with_token_path(mut self, path: impl Into<String>) -> Self {
        self.token_path = path.into();
        self
    }

    pub fn with_refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = path.into();
        self
    }

    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    pub fn with_credentials_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.credentials_dir = Some(dir.into());
        self
    }

    /// Resolve `path` against the base URL
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ClientError::Configuration(format!("Invalid path {path:?}: {e}")))
    }

    /// Open the credential store this configuration describes
    pub fn open_store(&self) -> TokenStore {
        match &self.credentials_dir {
            Some(dir) => TokenStore::new(FileBackend::new(dir.clone()), self.storage_key.clone()),
            None => TokenStore::new(MemoryBackend::new(), self.storage_key.clone()),
        }
    }
}

impl Default for AuthClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL).expect("default base URL is valid")
    }
}

/// Parse a base URL, making sure relative joins land under it
fn parse_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw)
        .map_err(|e| ClientError::Configuration(format!("Invalid base URL {raw:?}: {e}")))?;

    if url.cannot_be_a_base() {
        return Err(ClientError::Configuration(format!(
            "Base URL {raw:?} cannot have paths appended"
        )));
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url)
}
