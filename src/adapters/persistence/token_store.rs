//! JSON-file credential store for the backend's bearer tokens.
//!
//! Tokens live in an in-process cache and are mirrored to disk with a
//! write-replace save, so a crash mid-write never corrupts the file. An
//! in-memory mode backs tests and the mock backend.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::warn;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct TokenData {
    access: Option<String>,
    refresh: Option<String>,
}

/// Persisted access/refresh token pair.
pub struct TokenStore {
    path: Option<PathBuf>,
    cache: tokio::sync::RwLock<TokenData>,
}

impl TokenStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
            cache: tokio::sync::RwLock::new(TokenData::default()),
        }
    }

    /// Store that never touches disk. Used by tests and the mock backend.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            cache: tokio::sync::RwLock::new(TokenData::default()),
        }
    }

    /// Load persisted tokens from disk. A missing or unreadable file starts
    /// an empty session.
    pub async fn load(&self) {
        let Some(path) = &self.path else { return };
        let data = match fs::read_to_string(path).await {
            Ok(s) => serde_json::from_str(&s).unwrap_or_default(),
            Err(_) => TokenData::default(),
        };
        *self.cache.write().await = data;
    }

    pub async fn access_token(&self) -> Option<String> {
        self.cache.read().await.access.clone()
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.cache.read().await.refresh.clone()
    }

    /// Replace both tokens, e.g. after login.
    pub async fn store(&self, access: &str, refresh: &str) -> std::io::Result<()> {
        {
            let mut cache = self.cache.write().await;
            cache.access = Some(access.to_string());
            cache.refresh = Some(refresh.to_string());
        }
        self.save().await
    }

    /// Replace the access token only, e.g. after a refresh.
    pub async fn set_access(&self, access: &str) -> std::io::Result<()> {
        {
            let mut cache = self.cache.write().await;
            cache.access = Some(access.to_string());
        }
        self.save().await
    }

    /// Drop both tokens. A failed disk write only logs; the in-process
    /// session is already cleared either way.
    pub async fn clear(&self) {
        *self.cache.write().await = TokenData::default();
        if let Err(e) = self.save().await {
            warn!(error = %e, "failed to clear persisted tokens");
        }
    }

    /// Atomic save using the write-replace pattern: write a temp file,
    /// sync it, then rename over the target.
    async fn save(&self) -> std::io::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = {
            let data = self.cache.read().await;
            serde_json::to_string_pretty(&*data)
                .map_err(|e| std::io::Error::other(e.to_string()))?
        };

        let temp_path = path.with_extension("json.tmp");
        let mut f = fs::File::create(&temp_path).await?;
        f.write_all(json.as_bytes()).await?;
        f.sync_all().await?;
        drop(f);

        fs::rename(&temp_path, path).await
    }
}
