//! Secure key-value storage for session secrets
//!
//! The host platform supplies the real keychain-backed implementation. The
//! in-memory store is used by tests and by hosts without secure storage.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::Error;

/// Key holding the PKCE code verifier of the pending login
pub const CODE_VERIFIER_KEY: &str = "code_verifier";

/// Key holding the current access token
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Key holding the current refresh token
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Opaque secret storage consumed by the auth session
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Read a secret, `None` when the key is not set
    async fn get_secure(&self, key: &str) -> Result<Option<String>, Error>;

    /// Write a secret, replacing any previous value
    async fn set_secure(&self, key: &str, value: &str) -> Result<(), Error>;

    /// Remove a secret; clearing a missing key is not an error
    async fn clear_secure(&self, key: &str) -> Result<(), Error>;
}

/// Process-local secret store
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemorySecretStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-filled with the given entries
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let values = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            values: RwLock::new(values),
        }
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn get_secure(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set_secure(&self, key: &str, value: &str) -> Result<(), Error> {
        self.values
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn clear_secure(&self, key: &str) -> Result<(), Error> {
        self.values.write().await.remove(key);
        Ok(())
    }
}
