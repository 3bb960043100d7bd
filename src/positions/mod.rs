//! Device position queries

mod types;

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::graphql::GraphQLClient;

pub use types::*;

/// Root field holding the positions of every device visible to the user
pub const DEVICE_POSITIONS_ROOT_FIELD: &str = "devicePositionsByUser";

/// Query requesting the full position field set
pub const DEVICE_POSITIONS_QUERY: &str = r#"
query {
  devicePositionsByUser {
    attributes {
      temperature
      satellites
      mileage
      ignition
      hobbsMeter
    }
    altitude
    address
    deviceName
    transporterType
    state
    speed
    longitude
    latitude
    eventId
    transporterId
    deviceDateTime
    course
    country
    city
  }
}"#;

/// Anything able to produce the current device positions
#[async_trait]
pub trait PositionSource: Send + Sync {
    async fn fetch_positions(&self, cancel: &CancellationToken)
        -> Result<Vec<PositionRecord>, Error>;
}

/// Fetches device positions through the GraphQL router
pub struct PositionFetcher {
    graphql: Arc<GraphQLClient>,
    endpoint: String,
}

impl PositionFetcher {
    /// Create a fetcher posting to `endpoint`
    pub fn new(graphql: Arc<GraphQLClient>, endpoint: &str) -> Self {
        Self {
            graphql,
            endpoint: endpoint.to_string(),
        }
    }
}

#[async_trait]
impl PositionSource for PositionFetcher {
    /// An absent result, including server-reported errors, is an empty list
    async fn fetch_positions(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<PositionRecord>, Error> {
        let positions = self
            .graphql
            .execute::<Vec<PositionRecord>>(
                &self.endpoint,
                DEVICE_POSITIONS_QUERY,
                DEVICE_POSITIONS_ROOT_FIELD,
                cancel,
            )
            .await?;
        Ok(positions.unwrap_or_default())
    }
}
