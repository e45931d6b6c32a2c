//! File-backed token store.
//!
//! The CLI's stand-in for the device key-value store: one file holding one
//! opaque token string. Missing file means no token; the content is never
//! interpreted.

use std::path::PathBuf;

use async_trait::async_trait;
use courier_client::{StoreError, TokenStore};
use tokio::fs;

/// Token persisted as a single file.
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// Store backed by the given file path.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(&self.path).await {
            Ok(raw) => {
                let token = raw.trim().to_owned();
                Ok((!token.is_empty()).then_some(token))
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError(e.to_string())),
        }
    }

    async fn save(&self, token: &str) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| StoreError(e.to_string()))?;
        }
        fs::write(&self.path, token).await.map_err(|e| StoreError(e.to_string()))
    }

    async fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError(e.to_string())),
        }
    }
}
