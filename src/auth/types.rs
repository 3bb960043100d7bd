//! Types for authentication and session management

use serde::Deserialize;
use std::collections::HashMap;

/// Where the auth session currently is in the login lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// No tokens are stored
    LoggedOut,

    /// The interactive authorization flow is open
    AuthorizationInFlight,

    /// Access and refresh tokens are stored
    LoggedIn,
}

/// How an explicit login attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Tokens were exchanged and stored
    LoggedIn,

    /// The user closed the flow or the callback carried no code
    Cancelled,
}

/// Token endpoint response
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// The access token
    pub access_token: String,

    /// The refresh token
    pub refresh_token: String,

    /// The token type
    #[serde(default)]
    pub token_type: Option<String>,

    /// The expiry time in seconds
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// Properties returned by the interactive authorization flow
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationResult {
    /// Query parameters of the callback URI
    pub properties: HashMap<String, String>,
}

impl AuthorizationResult {
    /// Build a result from callback parameters
    pub fn new(properties: HashMap<String, String>) -> Self {
        Self { properties }
    }

    /// Parse the parameters of a callback URI such as `app://callback?code=..&state=..`
    pub fn from_callback_url(callback: &url::Url) -> Self {
        Self::new(callback.query_pairs().into_owned().collect())
    }

    /// The authorization code, when the user approved
    pub fn code(&self) -> Option<&str> {
        self.property("code")
    }

    /// The `state` echoed back by the authorization server
    pub fn state(&self) -> Option<&str> {
        self.property("state")
    }

    fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }
}
