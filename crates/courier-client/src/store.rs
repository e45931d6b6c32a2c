//! Persisted token store seam.
//!
//! The auth token lives in an external key-value collaborator (secure
//! storage on device, a file for the CLI). The core reads and writes exactly
//! one opaque string and never interprets it.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

/// Token store failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("token store: {0}")]
pub struct StoreError(pub String);

/// External persistence for the session token.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// The persisted token, if any.
    async fn load(&self) -> Result<Option<String>, StoreError>;

    /// Persist the token, replacing any previous one.
    async fn save(&self, token: &str) -> Result<(), StoreError>;

    /// Remove the persisted token.
    async fn clear(&self) -> Result<(), StoreError>;
}

/// In-memory store for tests and for running without persistence.
#[derive(Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self) -> Result<Option<String>, StoreError> {
        Ok(self.token.lock().await.clone())
    }

    async fn save(&self, token: &str) -> Result<(), StoreError> {
        *self.token.lock().await = Some(token.to_owned());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        *self.token.lock().await = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_load_clear_cycle() {
        let store = MemoryTokenStore::new();
        assert_eq!(store.load().await.unwrap(), None);

        store.save("t1").await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some("t1".to_owned()));

        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
    }
}
