//! TrackHub Sync Library
//!
//! Client core for the TrackHub fleet-tracking service: PKCE login against
//! the identity server, token storage and refresh, an authenticated GraphQL
//! client and activity-gated polling of device positions.

pub mod auth;
pub mod config;
pub mod error;
pub mod fetch;
pub mod graphql;
pub mod positions;
pub mod refresh;
pub mod secure_store;

use reqwest::Client;
use std::sync::Arc;

use crate::auth::{AuthSession, AuthorizationFlow, BrowserLauncher};
use crate::config::ClientOptions;
use crate::graphql::GraphQLClient;
use crate::positions::PositionFetcher;
use crate::refresh::RefreshScheduler;
use crate::secure_store::SecretStore;

/// The main entry point for the TrackHub client
pub struct TrackHub {
    /// HTTP client shared by every component
    pub http_client: Client,

    /// Login, refresh and logout
    pub auth: Arc<AuthSession>,

    /// Authenticated query execution
    pub graphql: Arc<GraphQLClient>,

    /// Device position queries
    pub positions: Arc<PositionFetcher>,

    /// Periodic position refresh
    pub scheduler: RefreshScheduler,

    /// Client options
    pub options: ClientOptions,
}

impl TrackHub {
    /// Wire every component from `options`
    ///
    /// # Example
    ///
    /// ```no_run
    /// use std::sync::Arc;
    /// use trackhub_sync::auth::{AuthorizationFlow, BrowserLauncher};
    /// use trackhub_sync::config::ClientOptions;
    /// use trackhub_sync::secure_store::MemorySecretStore;
    /// use trackhub_sync::TrackHub;
    ///
    /// fn build(flow: Arc<dyn AuthorizationFlow>, browser: Arc<dyn BrowserLauncher>) -> TrackHub {
    ///     let options = ClientOptions::default().with_base_url("https://track-hub.example");
    ///     TrackHub::new(Arc::new(MemorySecretStore::new()), flow, browser, options)
    /// }
    /// ```
    pub fn new(
        store: Arc<dyn SecretStore>,
        flow: Arc<dyn AuthorizationFlow>,
        browser: Arc<dyn BrowserLauncher>,
        options: ClientOptions,
    ) -> Self {
        Self::new_with_client(Client::new(), store, flow, browser, options)
    }

    /// Wire every component around an existing HTTP client
    pub fn new_with_client(
        http_client: Client,
        store: Arc<dyn SecretStore>,
        flow: Arc<dyn AuthorizationFlow>,
        browser: Arc<dyn BrowserLauncher>,
        options: ClientOptions,
    ) -> Self {
        let auth = Arc::new(AuthSession::new(
            http_client.clone(),
            store,
            flow,
            browser,
            options.clone(),
        ));
        let graphql = Arc::new(GraphQLClient::new(
            http_client.clone(),
            auth.clone(),
            options.clone(),
        ));
        let positions = Arc::new(PositionFetcher::new(
            graphql.clone(),
            &options.endpoints.graphql_url,
        ));
        let scheduler = RefreshScheduler::new(positions.clone(), &options);

        Self {
            http_client,
            auth,
            graphql,
            positions,
            scheduler,
            options,
        }
    }

    /// Get the auth session
    pub fn auth(&self) -> &AuthSession {
        &self.auth
    }

    /// Get the refresh scheduler
    pub fn scheduler(&self) -> &RefreshScheduler {
        &self.scheduler
    }
}

/// A convenience module for common imports
pub mod prelude {
    pub use crate::auth::{AuthSession, AuthState, LoginOutcome};
    pub use crate::config::{ClientOptions, RefreshPolicy};
    pub use crate::error::Error;
    pub use crate::positions::{FleetSummary, PositionRecord, PositionSource};
    pub use crate::refresh::{PositionsRefreshed, RefreshScheduler};
    pub use crate::secure_store::{MemorySecretStore, SecretStore};
    pub use crate::TrackHub;
}
