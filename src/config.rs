//! Configuration options for the TrackHub sync client

use std::time::Duration;

/// Default identity and API host
pub const DEFAULT_BASE_URL: &str = "https://track-hub.co";

/// When the GraphQL client asks the auth session for a fresh access token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshPolicy {
    /// Refresh when the stored token is missing, malformed or expired
    #[default]
    WhenInvalid,

    /// Refresh when the stored token is still valid. Kept only for hosts that
    /// depend on the behavior of the first mobile release.
    WhenValid,
}

impl RefreshPolicy {
    /// Whether a token with the given validity should be refreshed
    pub fn should_refresh(&self, token_is_valid: bool) -> bool {
        match self {
            RefreshPolicy::WhenInvalid => !token_is_valid,
            RefreshPolicy::WhenValid => token_is_valid,
        }
    }
}

/// Identity provider and API endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Authorization endpoint opened in the browser
    pub authorize_url: String,

    /// Token endpoint for code and refresh grants
    pub token_url: String,

    /// Token revocation endpoint
    pub revoke_url: String,

    /// End-session endpoint opened in the browser on logout
    pub logout_url: String,

    /// GraphQL router endpoint
    pub graphql_url: String,
}

impl Endpoints {
    /// Build the standard endpoint layout below a single host
    pub fn from_base_url(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            authorize_url: format!("{}/Identity/authorize", base),
            token_url: format!("{}/Identity/token", base),
            revoke_url: format!("{}/Identity/revoke", base),
            logout_url: format!("{}/Identity/logout", base),
            graphql_url: format!("{}/Router/graphql", base),
        }
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::from_base_url(DEFAULT_BASE_URL)
    }
}

/// Configuration options for the TrackHub sync client
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Remote endpoints
    pub endpoints: Endpoints,

    /// OAuth client id
    pub client_id: String,

    /// OAuth scope, `offline_access` is always appended
    pub scope: String,

    /// Redirect URI registered for the login callback
    pub callback_url: String,

    /// Redirect URI registered for the logout callback
    pub logout_callback_url: String,

    /// The request timeout
    pub request_timeout: Option<Duration>,

    /// When to refresh the access token before a GraphQL call
    pub token_refresh: RefreshPolicy,

    /// Interval between scheduler ticks
    pub poll_interval: Duration,

    /// Number of ticks between two fetch cycles
    pub ticks_per_refresh: u32,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            endpoints: Endpoints::default(),
            client_id: "mobile_client".to_string(),
            scope: "mobile_scope".to_string(),
            callback_url: "trackhubmobile://callback".to_string(),
            logout_callback_url: "trackhubmobile://logoutcallback".to_string(),
            request_timeout: Some(Duration::from_secs(10)),
            token_refresh: RefreshPolicy::default(),
            poll_interval: Duration::from_secs(5),
            ticks_per_refresh: 6,
        }
    }
}

impl ClientOptions {
    /// Point every endpoint at a different host
    pub fn with_base_url(mut self, value: &str) -> Self {
        self.endpoints = Endpoints::from_base_url(value);
        self
    }

    /// Set the endpoints explicitly
    pub fn with_endpoints(mut self, value: Endpoints) -> Self {
        self.endpoints = value;
        self
    }

    /// Set the OAuth client id
    pub fn with_client_id(mut self, value: &str) -> Self {
        self.client_id = value.to_string();
        self
    }

    /// Set the OAuth scope
    pub fn with_scope(mut self, value: &str) -> Self {
        self.scope = value.to_string();
        self
    }

    /// Set the login callback URI
    pub fn with_callback_url(mut self, value: &str) -> Self {
        self.callback_url = value.to_string();
        self
    }

    /// Set the logout callback URI
    pub fn with_logout_callback_url(mut self, value: &str) -> Self {
        self.logout_callback_url = value.to_string();
        self
    }

    /// Set the request timeout
    pub fn with_request_timeout(mut self, value: Option<Duration>) -> Self {
        self.request_timeout = value;
        self
    }

    /// Set the token refresh policy
    pub fn with_token_refresh(mut self, value: RefreshPolicy) -> Self {
        self.token_refresh = value;
        self
    }

    /// Set the scheduler tick interval
    pub fn with_poll_interval(mut self, value: Duration) -> Self {
        self.poll_interval = value;
        self
    }

    /// Set how many ticks make up one fetch cycle
    pub fn with_ticks_per_refresh(mut self, value: u32) -> Self {
        self.ticks_per_refresh = value.max(1);
        self
    }

    /// Scope sent to the authorization endpoint
    pub(crate) fn requested_scope(&self) -> String {
        format!("{} offline_access", self.scope)
    }
}
