//! ERP REST adapter (source system).
//!
//! # Endpoints
//!
//! - `GET {base}/products/{code}`: product with its stock breakdown
//!
//! Requests carry the bearer token issued by [`crate::ErpTokenIssuer`].

use async_trait::async_trait;
use tracing::debug;

use restock_domain::{AccessToken, Identifier, RemoteSystem};
use restock_exec::{SourcePort, SourceProductPayload, SyncError, SyncResult};

use crate::http::RestClient;

/// ERP REST API client.
#[derive(Debug, Clone)]
pub struct ErpRestClient {
    rest: RestClient,
}

impl ErpRestClient {
    /// Create a client for the ERP at `base_url`.
    pub fn new(base_url: &str) -> SyncResult<Self> {
        Ok(Self { rest: RestClient::new(RemoteSystem::Source, base_url)? })
    }
}

#[async_trait]
impl SourcePort for ErpRestClient {
    async fn fetch_product(
        &self,
        identifier: &Identifier,
        token: &AccessToken,
    ) -> SyncResult<SourceProductPayload> {
        let url = self
            .rest
            .endpoint(&["products", identifier.as_str()])
            .map_err(|e| e.classify(RemoteSystem::Source))?;
        debug!(identifier = %identifier, "Fetching ERP product");

        let request = self.rest.http().get(url).bearer_auth(token.expose());
        self.rest.send_json(request).await.map_err(|e| match e {
            // Carry the identifier rather than the response body
            SyncError::NotFound { system, .. } => SyncError::not_found(system, identifier.as_str()),
            other => other,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
