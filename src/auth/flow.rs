//! Platform collaborators driving the browser side of OAuth

use async_trait::async_trait;
use url::Url;

use super::types::AuthorizationResult;
use crate::error::Error;

/// Interactive, browser-based authorization
///
/// Implementations open `authorize_url` and resolve once the platform
/// receives a redirect to `callback_url`. A user who closes the browser
/// resolves to `Err(Error::Cancelled)`.
#[async_trait]
pub trait AuthorizationFlow: Send + Sync {
    async fn authenticate(
        &self,
        authorize_url: &Url,
        callback_url: &Url,
    ) -> Result<AuthorizationResult, Error>;
}

/// Opens a URL in the external browser without waiting for the user
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn open(&self, url: &Url) -> Result<(), Error>;
}
