//! Durable credential storage
//!
//! A [`TokenStore`] keeps the current [`TokenPair`] as JSON under a single key
//! of a [`CredentialBackend`]. Reads never fail: a missing key and a value that
//! does not parse are both reported as "no session".

use crate::types::TokenPair;
use papaya::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

/// Key under which the token pair is stored unless configured otherwise
pub const DEFAULT_STORAGE_KEY: &str = "tokens";

/// Raw string key/value storage
pub trait CredentialBackend: Send + Sync + 'static {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: String) -> std::io::Result<()>;

    /// Removing a key that does not exist succeeds
    fn remove(&self, key: &str) -> std::io::Result<()>;
}

/// Process-local backend using Papaya HashMap
#[derive(Clone)]
pub struct MemoryBackend {
    values: Arc<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            values: Arc::new(HashMap::new()),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialBackend for MemoryBackend {
    fn get(&self, key: &str) -> Option<String> {
        self.values.pin().get(key).cloned()
    }

    fn set(&self, key: &str, value: String) -> std::io::Result<()> {
        self.values.pin().insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> std::io::Result<()> {
        self.values.pin().remove(key);
        Ok(())
    }
}

/// One file per key under a directory
///
/// Files are written with mode 0600 on Unix.
#[derive(Clone, Debug)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl CredentialBackend for FileBackend {
    fn get(&self, key: &str) -> Option<String> {
        std::fs::read_to_string(self.path(key)).ok()
    }

    fn set(&self, key: &str, value: String) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path(key);
        std::fs::write(&path, value)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    fn remove(&self, key: &str) -> std::io::Result<()> {
        match std::fs::remove_file(self.path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Thread-safe token store
///
/// Cloning is cheap; clones share the same backend.
#[derive(Clone)]
pub struct TokenStore {
    backend: Arc<dyn CredentialBackend>,
    key: String,
}

impl TokenStore {
    /// Create a token store over `backend`, using `key` for the pair
    pub fn new(backend: impl CredentialBackend, key: impl Into<String>) -> Self {
        Self {
            backend: Arc::new(backend),
            key: key.into(),
        }
    }

    /// In-memory store under the default key
    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new(), DEFAULT_STORAGE_KEY)
    }

    /// Load the current token pair
    ///
    /// Corrupted data is treated the same as no session.
    pub fn load(&self) -> Option<TokenPair> {
        let raw = self.backend.get(&self.key)?;
        match serde_json::from_str(&raw) {
            Ok(tokens) => Some(tokens),
            Err(e) => {
                warn!(key = %self.key, error = %e, "Ignoring unparseable stored tokens");
                None
            }
        }
    }

    /// Current access token, if any
    pub fn access_token(&self) -> Option<String> {
        self.load().map(|tokens| tokens.access)
    }

    /// Current refresh token, if any
    pub fn refresh_token(&self) -> Option<String> {
        self.load().map(|tokens| tokens.refresh)
    }

    /// Replace the stored pair
    pub fn save(&self, tokens: &TokenPair) {
        let raw = match serde_json::to_string(tokens) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Failed to serialize tokens");
                return;
            }
        };

        if let Err(e) = self.backend.set(&self.key, raw) {
            warn!(key = %self.key, error = %e, "Failed to persist tokens");
        }
    }

    /// Remove the stored pair
    pub fn clear(&self) {
        if let Err(e) = self.backend.remove(&self.key) {
            warn!(key = %self.key, error = %e, "Failed to clear stored tokens");
        }
    }

    /// Write a raw value under the token key, bypassing serialization
    #[cfg(test)]
    pub(crate) fn put_raw(&self, raw: &str) {
        self.backend.set(&self.key, raw.to_string()).unwrap();
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::in_memory()
    }
}
