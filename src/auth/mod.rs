//! Authentication and token management for the TrackHub identity server
//!
//! [`AuthSession`] drives the OAuth2 authorization-code flow with PKCE,
//! keeps the access and refresh tokens in the [`SecretStore`], refreshes
//! them on demand and revokes them on logout.

mod flow;
pub mod pkce;
mod session;
pub mod token;
mod types;

use log::{debug, info, warn};
use reqwest::Client;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Mutex;
use url::Url;

use crate::config::ClientOptions;
use crate::error::Error;
use crate::fetch::Fetch;
use crate::secure_store::{SecretStore, ACCESS_TOKEN_KEY, CODE_VERIFIER_KEY, REFRESH_TOKEN_KEY};

pub use flow::*;
pub use session::*;
pub use types::*;

/// Client for the TrackHub identity server
pub struct AuthSession {
    /// HTTP client used for requests
    client: Client,

    /// Where tokens and the pending code verifier live
    store: Arc<dyn SecretStore>,

    /// Browser-based authorization collaborator
    flow: Arc<dyn AuthorizationFlow>,

    /// Opens the end-session page on logout
    browser: Arc<dyn BrowserLauncher>,

    /// Client options
    options: ClientOptions,

    /// The current lifecycle state
    state: RwLock<AuthState>,

    /// Serializes every write of the stored tokens
    token_lock: Mutex<()>,
}

impl AuthSession {
    /// Create a new auth session
    pub fn new(
        client: Client,
        store: Arc<dyn SecretStore>,
        flow: Arc<dyn AuthorizationFlow>,
        browser: Arc<dyn BrowserLauncher>,
        options: ClientOptions,
    ) -> Self {
        Self {
            client,
            store,
            flow,
            browser,
            options,
            state: RwLock::new(AuthState::LoggedOut),
            token_lock: Mutex::new(()),
        }
    }

    /// Get the current lifecycle state
    pub fn state(&self) -> AuthState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: AuthState) -> AuthState {
        let mut current = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if *current != state {
            debug!("Auth state changing from {:?} to {:?}", *current, state);
        }
        std::mem::replace(&mut *current, state)
    }

    /// Derive the lifecycle state from the tokens already in the store
    pub async fn restore(&self) -> Result<AuthState, Error> {
        let session = Session::load(self.store.as_ref()).await?;
        let state = if session.is_empty() {
            AuthState::LoggedOut
        } else {
            AuthState::LoggedIn
        };
        self.set_state(state);
        Ok(state)
    }

    /// Get the stored tokens
    pub async fn session(&self) -> Result<Session, Error> {
        Session::load(self.store.as_ref()).await
    }

    /// Get the stored access token
    pub async fn access_token(&self) -> Result<Option<String>, Error> {
        Ok(self.session().await?.access_token)
    }

    /// Run the interactive PKCE login
    ///
    /// Returns [`LoginOutcome::Cancelled`] when the flow ends without an
    /// authorization code; stored tokens are left untouched in that case.
    pub async fn login(&self) -> Result<LoginOutcome, Error> {
        let code_verifier = match self.store.get_secure(CODE_VERIFIER_KEY).await? {
            Some(verifier) if !verifier.is_empty() => verifier,
            _ => {
                let verifier = pkce::generate_code_verifier();
                self.store.set_secure(CODE_VERIFIER_KEY, &verifier).await?;
                verifier
            }
        };

        let code_challenge = pkce::generate_code_challenge(&code_verifier);
        let state = pkce::generate_state();
        let authorize_url = self.authorize_url(&code_challenge, &state)?;
        let callback_url = Url::parse(&self.options.callback_url)?;

        info!("Starting interactive authorization");
        let _pending = PendingAuthorization::begin(self);

        let result = match self.flow.authenticate(&authorize_url, &callback_url).await {
            Ok(result) => result,
            Err(Error::Cancelled) => {
                info!("Authorization cancelled by the user");
                return Ok(LoginOutcome::Cancelled);
            }
            Err(err) => return Err(err),
        };

        let Some(code) = result.code() else {
            info!("Authorization callback carried no code");
            return Ok(LoginOutcome::Cancelled);
        };

        if result.state().is_some_and(|returned| returned != state) {
            warn!("Authorization callback state does not match the request");
            return Err(Error::StateMismatch);
        }

        self.exchange_code_for_tokens(code, &code_verifier).await?;
        info!("Login completed");
        self.set_state(AuthState::LoggedIn);
        Ok(LoginOutcome::LoggedIn)
    }

    /// Build the authorization URL opened in the browser
    fn authorize_url(&self, code_challenge: &str, state: &str) -> Result<Url, Error> {
        let scope = self.options.requested_scope();
        let url = Url::parse_with_params(
            &self.options.endpoints.authorize_url,
            &[
                ("client_id", self.options.client_id.as_str()),
                ("redirect_uri", self.options.callback_url.as_str()),
                ("response_type", "code"),
                ("scope", scope.as_str()),
                ("code_challenge", code_challenge),
                ("code_challenge_method", pkce::CODE_CHALLENGE_METHOD),
                ("state", state),
            ],
        )?;
        Ok(url)
    }

    /// Exchange the authorization code for tokens and store them
    async fn exchange_code_for_tokens(&self, code: &str, code_verifier: &str) -> Result<(), Error> {
        let _guard = self.token_lock.lock().await;

        let response = Fetch::post(&self.client, &self.options.endpoints.token_url)
            .form(&[
                ("grant_type", "authorization_code"),
                ("client_id", self.options.client_id.as_str()),
                ("redirect_uri", self.options.callback_url.as_str()),
                ("code", code),
                ("code_verifier", code_verifier),
            ])
            .timeout(self.options.request_timeout)
            .execute_raw()
            .await?;

        let status = response.status();
        let content = response.text().await?;

        // The verifier is bound to this code whatever the server answered
        self.store.clear_secure(CODE_VERIFIER_KEY).await?;

        if !status.is_success() {
            warn!("Token exchange failed with status {}", status);
            return Err(Error::TokenExchange(content));
        }

        let tokens: TokenResponse = serde_json::from_str(&content)?;
        Session::store(self.store.as_ref(), &tokens.access_token, &tokens.refresh_token).await
    }

    /// Refresh the access token with the stored refresh token
    ///
    /// Falls back to a full [`login`](Self::login) when no refresh token is
    /// stored or the token endpoint rejects it; `None` is returned then.
    /// When the stored refresh token changes while this call waits for the
    /// token lock, nothing is posted and the current access token is returned.
    pub async fn refresh_access_token(&self) -> Result<Option<String>, Error> {
        let refresh_token = match self.store.get_secure(REFRESH_TOKEN_KEY).await? {
            Some(token) if !token.is_empty() => token,
            _ => {
                info!("No refresh token stored, starting login");
                self.login().await?;
                return Ok(None);
            }
        };

        let refreshed = {
            let _guard = self.token_lock.lock().await;

            // Another refresh or a logout may have replaced the token while we waited
            let current = self.store.get_secure(REFRESH_TOKEN_KEY).await?;
            if current.as_deref() != Some(refresh_token.as_str()) {
                debug!("Refresh token changed while waiting, skipping refresh");
                return Ok(Session::load(self.store.as_ref()).await?.access_token);
            }

            let response = Fetch::post(&self.client, &self.options.endpoints.token_url)
                .form(&[
                    ("client_id", self.options.client_id.as_str()),
                    ("grant_type", "refresh_token"),
                    ("refresh_token", refresh_token.as_str()),
                ])
                .timeout(self.options.request_timeout)
                .execute_raw()
                .await?;

            if response.status().is_success() {
                let tokens: TokenResponse = response.json().await?;
                Session::store(self.store.as_ref(), &tokens.access_token, &tokens.refresh_token)
                    .await?;
                Some(tokens.access_token)
            } else {
                warn!("Token refresh failed with status {}", response.status());
                None
            }
        };

        match refreshed {
            Some(access_token) => {
                debug!("Access token refreshed");
                self.set_state(AuthState::LoggedIn);
                Ok(Some(access_token))
            }
            None => {
                self.login().await?;
                Ok(None)
            }
        }
    }

    /// Revoke both tokens, clear them and open the end-session page
    ///
    /// Each revocation is attempted independently and the stored tokens are
    /// cleared even if the server rejects one. The first revocation error is
    /// returned after everything else has run.
    pub async fn logout(&self) -> Result<(), Error> {
        let (access_result, refresh_result) = {
            let _guard = self.token_lock.lock().await;
            let session = Session::load(self.store.as_ref()).await?;

            let access_result = self.revoke_token(session.access_token.as_deref()).await;
            if let Err(err) = &access_result {
                warn!("Failed to revoke access token: {}", err);
            }
            let refresh_result = self.revoke_token(session.refresh_token.as_deref()).await;
            if let Err(err) = &refresh_result {
                warn!("Failed to revoke refresh token: {}", err);
            }

            Session::clear(self.store.as_ref()).await?;
            self.set_state(AuthState::LoggedOut);
            (access_result, refresh_result)
        };

        let logout_url = Url::parse_with_params(
            &self.options.endpoints.logout_url,
            &[(
                "post_logout_redirect_uri",
                self.options.logout_callback_url.as_str(),
            )],
        )?;
        if let Err(err) = self.browser.open(&logout_url).await {
            warn!("Failed to open logout page: {}", err);
        }

        info!("Logged out");
        access_result.and(refresh_result)
    }

    /// Revoke a single token; absent or empty tokens are ignored
    pub async fn revoke_token(&self, token: Option<&str>) -> Result<(), Error> {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return Ok(());
        };

        let response = Fetch::post(&self.client, &self.options.endpoints.revoke_url)
            .form(&[
                ("client_id", self.options.client_id.as_str()),
                ("token", token),
            ])
            .timeout(self.options.request_timeout)
            .execute_raw()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Revoke { status, body });
        }

        Ok(())
    }
}

/// Marks an authorization as in flight and rolls the state back unless the
/// login completed, including when the login future is dropped
struct PendingAuthorization<'a> {
    auth: &'a AuthSession,
    previous: AuthState,
}

impl<'a> PendingAuthorization<'a> {
    fn begin(auth: &'a AuthSession) -> Self {
        let previous = auth.set_state(AuthState::AuthorizationInFlight);
        Self { auth, previous }
    }
}

impl Drop for PendingAuthorization<'_> {
    fn drop(&mut self) {
        if self.auth.state() == AuthState::AuthorizationInFlight {
            self.auth.set_state(self.previous);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secure_store::MemorySecretStore;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Flow that answers every authorization with a fixed result
    struct ScriptedFlow {
        result: Result<AuthorizationResult, Error>,
        seen: StdMutex<Vec<Url>>,
    }

    impl ScriptedFlow {
        fn approving(code: &str) -> Self {
            let mut properties = HashMap::new();
            properties.insert("code".to_string(), code.to_string());
            Self {
                result: Ok(AuthorizationResult::new(properties)),
                seen: StdMutex::new(Vec::new()),
            }
        }

        fn with_result(result: Result<AuthorizationResult, Error>) -> Self {
            Self {
                result,
                seen: StdMutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait::async_trait]
    impl AuthorizationFlow for ScriptedFlow {
        async fn authenticate(
            &self,
            authorize_url: &Url,
            _callback_url: &Url,
        ) -> Result<AuthorizationResult, Error> {
            self.seen.lock().unwrap().push(authorize_url.clone());
            match &self.result {
                Ok(result) => Ok(result.clone()),
                Err(Error::Cancelled) => Err(Error::Cancelled),
                Err(err) => Err(Error::general(err)),
            }
        }
    }

    #[derive(Default)]
    struct RecordingBrowser {
        opened: StdMutex<Vec<Url>>,
    }

    #[async_trait::async_trait]
    impl BrowserLauncher for RecordingBrowser {
        async fn open(&self, url: &Url) -> Result<(), Error> {
            self.opened.lock().unwrap().push(url.clone());
            Ok(())
        }
    }

    fn session_for(
        server: &MockServer,
        store: Arc<MemorySecretStore>,
        flow: Arc<ScriptedFlow>,
        browser: Arc<RecordingBrowser>,
    ) -> AuthSession {
        let options = ClientOptions::default().with_base_url(&server.uri());
        AuthSession::new(Client::new(), store, flow, browser, options)
    }

    #[tokio::test]
    async fn test_login_exchanges_code_and_stores_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Identity/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=the-code"))
            .and(body_string_contains("code_verifier="))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at1",
                "refresh_token": "rt1",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemorySecretStore::new());
        let flow = Arc::new(ScriptedFlow::approving("the-code"));
        let auth = session_for(&server, store.clone(), flow.clone(), Default::default());

        let outcome = auth.login().await.unwrap();

        assert_eq!(outcome, LoginOutcome::LoggedIn);
        assert_eq!(auth.state(), AuthState::LoggedIn);
        assert_eq!(store.get_secure(ACCESS_TOKEN_KEY).await.unwrap().as_deref(), Some("at1"));
        assert_eq!(store.get_secure(REFRESH_TOKEN_KEY).await.unwrap().as_deref(), Some("rt1"));
        assert_eq!(store.get_secure(CODE_VERIFIER_KEY).await.unwrap(), None);

        let seen = flow.seen.lock().unwrap();
        let params: HashMap<String, String> = seen[0].query_pairs().into_owned().collect();
        assert_eq!(params["client_id"], "mobile_client");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["scope"], "mobile_scope offline_access");
        assert_eq!(params["code_challenge_method"], "S256");
        assert_eq!(params["redirect_uri"], "trackhubmobile://callback");
        assert_eq!(params["state"].len(), 32);
    }

    #[tokio::test]
    async fn test_login_reuses_pending_code_verifier() {
        let server = MockServer::start().await;
        let store = Arc::new(MemorySecretStore::with_entries([(CODE_VERIFIER_KEY, "pending")]));
        let flow = Arc::new(ScriptedFlow::with_result(Ok(AuthorizationResult::default())));
        let auth = session_for(&server, store.clone(), flow.clone(), Default::default());

        auth.login().await.unwrap();

        let seen = flow.seen.lock().unwrap();
        let params: HashMap<String, String> = seen[0].query_pairs().into_owned().collect();
        assert_eq!(params["code_challenge"], pkce::generate_code_challenge("pending"));
        assert_eq!(
            store.get_secure(CODE_VERIFIER_KEY).await.unwrap().as_deref(),
            Some("pending")
        );
    }

    #[tokio::test]
    async fn test_login_without_code_is_cancelled() {
        let server = MockServer::start().await;
        let store = Arc::new(MemorySecretStore::new());
        let flow = Arc::new(ScriptedFlow::with_result(Ok(AuthorizationResult::default())));
        let auth = session_for(&server, store.clone(), flow, Default::default());

        assert_eq!(auth.login().await.unwrap(), LoginOutcome::Cancelled);
        assert_eq!(auth.state(), AuthState::LoggedOut);
        assert_eq!(store.get_secure(ACCESS_TOKEN_KEY).await.unwrap(), None);
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_login_cancelled_by_flow() {
        let server = MockServer::start().await;
        let store = Arc::new(MemorySecretStore::new());
        let flow = Arc::new(ScriptedFlow::with_result(Err(Error::Cancelled)));
        let auth = session_for(&server, store, flow, Default::default());

        assert_eq!(auth.login().await.unwrap(), LoginOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_login_rejects_state_mismatch() {
        let server = MockServer::start().await;
        let mut properties = HashMap::new();
        properties.insert("code".to_string(), "c".to_string());
        properties.insert("state".to_string(), "forged".to_string());
        let flow = Arc::new(ScriptedFlow::with_result(Ok(AuthorizationResult::new(properties))));
        let auth = session_for(&server, Arc::new(MemorySecretStore::new()), flow, Default::default());

        assert!(matches!(auth.login().await, Err(Error::StateMismatch)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_login_token_error_carries_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Identity/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
            .mount(&server)
            .await;

        let store = Arc::new(MemorySecretStore::new());
        let flow = Arc::new(ScriptedFlow::approving("bad-code"));
        let auth = session_for(&server, store.clone(), flow, Default::default());

        match auth.login().await {
            Err(Error::TokenExchange(body)) => assert_eq!(body, "invalid_grant"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(auth.state(), AuthState::LoggedOut);
        assert_eq!(store.get_secure(ACCESS_TOKEN_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_refresh_without_refresh_token_logs_in() {
        let server = MockServer::start().await;
        let flow = Arc::new(ScriptedFlow::with_result(Ok(AuthorizationResult::default())));
        let auth = session_for(&server, Arc::new(MemorySecretStore::new()), flow.clone(), Default::default());

        let token = auth.refresh_access_token().await.unwrap();

        assert_eq!(token, None);
        assert_eq!(flow.calls(), 1);
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_stores_rotated_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Identity/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=rt1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at2",
                "refresh_token": "rt2"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemorySecretStore::with_entries([(REFRESH_TOKEN_KEY, "rt1")]));
        let flow = Arc::new(ScriptedFlow::with_result(Ok(AuthorizationResult::default())));
        let auth = session_for(&server, store.clone(), flow.clone(), Default::default());

        let token = auth.refresh_access_token().await.unwrap();

        assert_eq!(token.as_deref(), Some("at2"));
        assert_eq!(store.get_secure(ACCESS_TOKEN_KEY).await.unwrap().as_deref(), Some("at2"));
        assert_eq!(store.get_secure(REFRESH_TOKEN_KEY).await.unwrap().as_deref(), Some("rt2"));
        assert_eq!(flow.calls(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_post_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Identity/token"))
            .and(body_string_contains("refresh_token=rt1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at2",
                "refresh_token": "rt2"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/Identity/token"))
            .and(body_string_contains("refresh_token=rt2"))
            .respond_with(ResponseTemplate::new(400))
            .expect(0)
            .mount(&server)
            .await;

        let store = Arc::new(MemorySecretStore::with_entries([(REFRESH_TOKEN_KEY, "rt1")]));
        let flow = Arc::new(ScriptedFlow::with_result(Ok(AuthorizationResult::default())));
        let auth = session_for(&server, store.clone(), flow.clone(), Default::default());

        let (first, second) = tokio::join!(auth.refresh_access_token(), auth.refresh_access_token());

        assert_eq!(first.unwrap().as_deref(), Some("at2"));
        assert_eq!(second.unwrap().as_deref(), Some("at2"));
        assert_eq!(flow.calls(), 0);
        assert_eq!(store.get_secure(REFRESH_TOKEN_KEY).await.unwrap().as_deref(), Some("rt2"));
    }

    #[tokio::test]
    async fn test_refresh_waiting_on_logout_does_not_restore_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Identity/revoke"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/Identity/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at2",
                "refresh_token": "rt2"
            })))
            .expect(0)
            .mount(&server)
            .await;

        let store = Arc::new(MemorySecretStore::with_entries([
            (ACCESS_TOKEN_KEY, "at1"),
            (REFRESH_TOKEN_KEY, "rt1"),
        ]));
        let flow = Arc::new(ScriptedFlow::with_result(Ok(AuthorizationResult::default())));
        let auth = session_for(&server, store.clone(), flow.clone(), Default::default());

        let (logout, refreshed) = tokio::join!(auth.logout(), auth.refresh_access_token());

        assert!(logout.is_err());
        assert_eq!(refreshed.unwrap(), None);
        assert_eq!(flow.calls(), 0);
        assert_eq!(auth.state(), AuthState::LoggedOut);
        assert!(Session::load(store.as_ref()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_rejected_falls_back_to_login() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Identity/token"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let store = Arc::new(MemorySecretStore::with_entries([(REFRESH_TOKEN_KEY, "stale")]));
        let flow = Arc::new(ScriptedFlow::with_result(Ok(AuthorizationResult::default())));
        let auth = session_for(&server, store, flow.clone(), Default::default());

        assert_eq!(auth.refresh_access_token().await.unwrap(), None);
        assert_eq!(flow.calls(), 1);
    }

    #[tokio::test]
    async fn test_revoke_absent_token_is_noop() {
        let server = MockServer::start().await;
        let flow = Arc::new(ScriptedFlow::with_result(Ok(AuthorizationResult::default())));
        let auth = session_for(&server, Arc::new(MemorySecretStore::new()), flow, Default::default());

        auth.revoke_token(None).await.unwrap();
        auth.revoke_token(Some("")).await.unwrap();
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_revoke_failure_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Identity/revoke"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let flow = Arc::new(ScriptedFlow::with_result(Ok(AuthorizationResult::default())));
        let auth = session_for(&server, Arc::new(MemorySecretStore::new()), flow, Default::default());

        match auth.revoke_token(Some("at1")).await {
            Err(Error::Revoke { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_logout_clears_tokens_even_when_revoke_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Identity/revoke"))
            .and(body_string_contains("token=at1"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/Identity/revoke"))
            .and(body_string_contains("token=rt1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemorySecretStore::with_entries([
            (ACCESS_TOKEN_KEY, "at1"),
            (REFRESH_TOKEN_KEY, "rt1"),
        ]));
        let flow = Arc::new(ScriptedFlow::with_result(Ok(AuthorizationResult::default())));
        let browser = Arc::new(RecordingBrowser::default());
        let auth = session_for(&server, store.clone(), flow, browser.clone());
        auth.restore().await.unwrap();

        let result = auth.logout().await;

        assert!(matches!(result, Err(Error::Revoke { status: 500, .. })));
        assert_eq!(auth.state(), AuthState::LoggedOut);
        assert!(Session::load(store.as_ref()).await.unwrap().is_empty());

        let opened = browser.opened.lock().unwrap();
        assert_eq!(opened.len(), 1);
        assert!(opened[0].as_str().starts_with(&format!("{}/Identity/logout?", server.uri())));
        assert!(opened[0]
            .query_pairs()
            .any(|(k, v)| k == "post_logout_redirect_uri" && v == "trackhubmobile://logoutcallback"));
    }

    #[tokio::test]
    async fn test_restore_state() {
        let server = MockServer::start().await;
        let flow = Arc::new(ScriptedFlow::with_result(Ok(AuthorizationResult::default())));
        let store = Arc::new(MemorySecretStore::with_entries([(REFRESH_TOKEN_KEY, "rt1")]));
        let auth = session_for(&server, store, flow, Default::default());

        assert_eq!(auth.state(), AuthState::LoggedOut);
        assert_eq!(auth.restore().await.unwrap(), AuthState::LoggedIn);
    }
}
