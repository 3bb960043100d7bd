//! Session data read back from the secret store

use crate::error::Error;
use crate::secure_store::{SecretStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};

use super::token;

/// Tokens currently held for the signed-in user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// The access token
    pub access_token: Option<String>,

    /// The refresh token
    pub refresh_token: Option<String>,
}

impl Session {
    /// Read both tokens from the store
    pub async fn load(store: &dyn SecretStore) -> Result<Self, Error> {
        Ok(Self {
            access_token: non_empty(store.get_secure(ACCESS_TOKEN_KEY).await?),
            refresh_token: non_empty(store.get_secure(REFRESH_TOKEN_KEY).await?),
        })
    }

    /// Persist both tokens together
    pub(crate) async fn store(
        store: &dyn SecretStore,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<(), Error> {
        store.set_secure(ACCESS_TOKEN_KEY, access_token).await?;
        store.set_secure(REFRESH_TOKEN_KEY, refresh_token).await?;
        Ok(())
    }

    /// Remove both tokens together
    pub(crate) async fn clear(store: &dyn SecretStore) -> Result<(), Error> {
        store.clear_secure(ACCESS_TOKEN_KEY).await?;
        store.clear_secure(REFRESH_TOKEN_KEY).await?;
        Ok(())
    }

    /// Whether any token is held
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }

    /// Check if the access token is present and unexpired
    pub fn has_valid_access_token(&self) -> bool {
        token::is_token_valid(self.access_token.as_deref())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secure_store::MemorySecretStore;

    #[tokio::test]
    async fn test_store_load_clear() {
        let store = MemorySecretStore::new();
        assert!(Session::load(&store).await.unwrap().is_empty());

        Session::store(&store, "at1", "rt1").await.unwrap();
        let session = Session::load(&store).await.unwrap();
        assert_eq!(session.access_token.as_deref(), Some("at1"));
        assert_eq!(session.refresh_token.as_deref(), Some("rt1"));
        assert!(!session.has_valid_access_token());

        Session::clear(&store).await.unwrap();
        assert!(Session::load(&store).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_values_are_absent() {
        let store = MemorySecretStore::with_entries([(ACCESS_TOKEN_KEY, "")]);
        assert!(Session::load(&store).await.unwrap().is_empty());
    }

    /// Store whose keychain is unavailable
    struct LockedStore;

    #[async_trait::async_trait]
    impl SecretStore for LockedStore {
        async fn get_secure(&self, _key: &str) -> Result<Option<String>, Error> {
            Err(Error::storage("keychain locked"))
        }

        async fn set_secure(&self, _key: &str, _value: &str) -> Result<(), Error> {
            Err(Error::storage("keychain locked"))
        }

        async fn clear_secure(&self, _key: &str) -> Result<(), Error> {
            Err(Error::storage("keychain locked"))
        }
    }

    #[tokio::test]
    async fn test_store_failures_propagate() {
        let result = Session::load(&LockedStore).await;
        assert!(matches!(result, Err(Error::Storage(message)) if message == "keychain locked"));
        assert!(Session::clear(&LockedStore).await.is_err());
    }
}
