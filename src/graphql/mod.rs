//! Single-query GraphQL client
//!
//! Every call posts one query, attaches the current bearer token and reads
//! exactly one root field out of the response envelope.

mod envelope;

use log::{debug, warn};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::auth::AuthSession;
use crate::config::ClientOptions;
use crate::error::Error;
use crate::fetch::Fetch;

pub use envelope::*;

/// Request body sent to the GraphQL endpoint
#[derive(Debug, Serialize)]
struct GraphQLRequest<'a> {
    query: &'a str,
}

/// Client executing authenticated GraphQL queries
pub struct GraphQLClient {
    /// HTTP client used for requests
    client: Client,

    /// Source of bearer tokens
    auth: Arc<AuthSession>,

    /// Client options
    options: ClientOptions,
}

impl GraphQLClient {
    /// Create a new GraphQL client
    pub fn new(client: Client, auth: Arc<AuthSession>, options: ClientOptions) -> Self {
        Self {
            client,
            auth,
            options,
        }
    }

    /// Run `query` and deserialize `data.<root_field>`
    ///
    /// Server-reported errors and a missing root field both yield `None`.
    ///
    /// Every object key under the root field is lower-cased before decoding,
    /// at any depth. `T` must name multi-word fields in lower case on the
    /// deserialize side, e.g. `#[serde(rename(deserialize = "devicename"))]`;
    /// a `rename_all = "camelCase"` type will not see those fields.
    pub async fn execute<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &str,
        root_field: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<T>, Error> {
        Ok(self
            .execute_outcome(endpoint, query, root_field, cancel)
            .await?
            .into_data())
    }

    /// Run `query` and return the decoded envelope
    ///
    /// Keys are folded the same way as for [`execute`](Self::execute).
    pub async fn execute_outcome<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &str,
        root_field: &str,
        cancel: &CancellationToken,
    ) -> Result<QueryOutcome<T>, Error> {
        let body = tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            body = self.post_query(endpoint, query) => body?,
        };

        let envelope: Envelope = serde_json::from_slice(&body)?;
        let outcome = envelope.into_outcome(root_field)?;
        if let QueryOutcome::Errors(messages) = &outcome {
            warn!("GraphQL query on {} returned errors: {:?}", root_field, messages);
        } else if outcome.is_absent() {
            debug!("GraphQL response carried no {} field", root_field);
        }
        Ok(outcome)
    }

    /// Attach the bearer token and post the query, returning the raw body
    async fn post_query(&self, endpoint: &str, query: &str) -> Result<Vec<u8>, Error> {
        let bearer = self.bearer_token().await?;

        let mut request = Fetch::post(&self.client, endpoint)
            .json(&GraphQLRequest { query })?
            .timeout(self.options.request_timeout);
        if let Some(bearer) = &bearer {
            request = request.bearer_auth(bearer);
        }

        let response = request.execute_raw().await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Read the stored access token, refreshing it when the policy asks for it
    async fn bearer_token(&self) -> Result<Option<String>, Error> {
        let session = self.auth.session().await?;
        let valid = session.has_valid_access_token();
        if !self.options.token_refresh.should_refresh(valid) {
            return Ok(session.access_token);
        }

        debug!("Refreshing access token before query (valid: {})", valid);
        match self.auth.refresh_access_token().await? {
            Some(fresh) => Ok(Some(fresh)),
            // A fallback login may have stored new tokens
            None => self.auth.access_token().await,
        }
    }
}
