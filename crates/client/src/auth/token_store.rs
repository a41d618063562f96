//! Where the session's bearer token lives between requests.
//!
//! The browser app keeps it in local storage; here it is either in memory or
//! in a small JSON file so CLI invocations can share a login.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from a token store backend.
#[derive(Debug, Error)]
pub enum TokenStoreError {
    #[error("token file I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("token file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("token store lock poisoned")]
    Poisoned,
}

/// Persistent slot for a single bearer token.
pub trait TokenStore: Send + Sync {
    /// Read the stored token, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn load(&self) -> Result<Option<SecretString>, TokenStoreError>;

    /// Replace the stored token.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn save(&self, token: &SecretString) -> Result<(), TokenStoreError>;

    /// Remove the stored token.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn clear(&self) -> Result<(), TokenStoreError>;
}

/// Token held in process memory only.
#[derive(Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<SecretString>>,
}

impl MemoryTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<SecretString>, TokenStoreError> {
        let guard = self.token.lock().map_err(|_| TokenStoreError::Poisoned)?;
        Ok(guard.clone())
    }

    fn save(&self, token: &SecretString) -> Result<(), TokenStoreError> {
        let mut guard = self.token.lock().map_err(|_| TokenStoreError::Poisoned)?;
        *guard = Some(token.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        let mut guard = self.token.lock().map_err(|_| TokenStoreError::Poisoned)?;
        *guard = None;
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct TokenFile {
    token: String,
}

/// Token persisted as `{"token": "..."}` in a file.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<SecretString>, TokenStoreError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let file: TokenFile = serde_json::from_str(&raw)?;
        Ok(Some(SecretString::from(file.token)))
    }

    fn save(&self, token: &SecretString) -> Result<(), TokenStoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_string(&TokenFile {
            token: token.expose_secret().to_string(),
        })?;
        std::fs::write(&self.path, body)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryTokenStore::new();
        assert!(store.load().unwrap().is_none());

        store.save(&SecretString::from("abc")).unwrap();
        assert_eq!(store.load().unwrap().unwrap().expose_secret(), "abc");

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = std::env::temp_dir().join(format!("petverse-token-{}", uuid::Uuid::new_v4()));
        let store = FileTokenStore::new(dir.join("session.json"));

        assert!(store.load().unwrap().is_none());
        store.save(&SecretString::from("jwt-value")).unwrap();
        assert_eq!(store.load().unwrap().unwrap().expose_secret(), "jwt-value");

        store.clear().unwrap();
        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_file_store_corrupt() {
        let path = std::env::temp_dir().join(format!("petverse-token-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, "not json").unwrap();

        let store = FileTokenStore::new(&path);
        assert!(matches!(store.load(), Err(TokenStoreError::Corrupt(_))));

        let _ = std::fs::remove_file(path);
    }
}
