use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::AuthError;
use crate::api::TokenPair;

/// Tokens persisted between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTokens {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    /// RFC 3339 timestamp of the last save.
    #[serde(default)]
    pub saved_at: Option<String>,
}

impl StoredTokens {
    fn from_pair(pair: &TokenPair) -> Self {
        Self {
            access_token: Some(pair.access_token.clone()),
            refresh_token: Some(pair.refresh_token.clone()),
            token_type: Some(pair.token_type.clone()),
            saved_at: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
        }
    }
}

/// Client-side storage for the access/refresh token pair.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<StoredTokens, AuthError>;
    fn save(&self, tokens: &TokenPair) -> Result<(), AuthError>;
    fn clear(&self) -> Result<(), AuthError>;
}

/// Token file on disk, readable only by the owner on unix.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/webagent/tokens.json`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("webagent").join("tokens.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> AuthError {
        AuthError::Store {
            path: self.path.clone(),
            source,
        }
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<StoredTokens, AuthError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoredTokens::default()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn save(&self, tokens: &TokenPair) -> Result<(), AuthError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let contents = serde_json::to_string_pretty(&StoredTokens::from_pair(tokens))?;

        let mut opts = OpenOptions::new();
        opts.create(true).truncate(true).write(true);
        #[cfg(unix)]
        {
            opts.mode(0o600);
        }
        let mut f = opts.open(&self.path).map_err(|e| self.io_error(e))?;
        f.write_all(contents.as_bytes())
            .and_then(|_| f.flush())
            .map_err(|e| self.io_error(e))
    }

    fn clear(&self) -> Result<(), AuthError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

/// In-process store, used when nothing should touch the filesystem.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<StoredTokens>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(tokens: StoredTokens) -> Self {
        Self {
            tokens: Mutex::new(tokens),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<StoredTokens, AuthError> {
        Ok(self
            .tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, tokens: &TokenPair) -> Result<(), AuthError> {
        *self.tokens.lock().unwrap_or_else(PoisonError::into_inner) =
            StoredTokens::from_pair(tokens);
        Ok(())
    }

    fn clear(&self) -> Result<(), AuthError> {
        *self.tokens.lock().unwrap_or_else(PoisonError::into_inner) = StoredTokens::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(access: &str, refresh: &str) -> TokenPair {
        TokenPair {
            access_token: access.to_string(),
            refresh_token: refresh.to_string(),
            token_type: "bearer".to_string(),
        }
    }

    #[test]
    fn test_file_store_round_trip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("nested").join("tokens.json"));

        assert_eq!(store.load().unwrap(), StoredTokens::default());

        store.save(&pair("a1", "r1")).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded.access_token.as_deref(), Some("a1"));
        assert_eq!(loaded.refresh_token.as_deref(), Some("r1"));
        assert!(loaded.saved_at.is_some());

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), StoredTokens::default());
        // Clearing twice is fine.
        store.clear().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("tokens.json"));
        store.save(&pair("a", "r")).unwrap();
        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            FileTokenStore::new(path).load(),
            Err(AuthError::Serde(_))
        ));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryTokenStore::new();
        store.save(&pair("a", "r")).unwrap();
        assert_eq!(store.load().unwrap().access_token.as_deref(), Some("a"));
        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), StoredTokens::default());
    }
}
