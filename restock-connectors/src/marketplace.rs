//! Marketplace REST adapter (sink system).
//!
//! # Endpoints
//!
//! - `GET {base}/users/{seller}/items/search?status=active&offset=&limit=`
//! - `GET {base}/items/{id}`
//! - `PUT {base}/items/{id}` with `{"available_quantity": n}`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use restock_domain::{AccessToken, ListingHandle, Quantity, RemoteSystem, SinkItem};
use restock_exec::{ListingPage, SinkPort, SyncResult};

use crate::http::RestClient;

/// Marketplace REST API client.
#[derive(Debug, Clone)]
pub struct MarketplaceRestClient {
    rest: RestClient,
    seller_id: String,
}

impl MarketplaceRestClient {
    /// Create a client for `seller_id`'s listings at `base_url`.
    pub fn new(base_url: &str, seller_id: impl Into<String>) -> SyncResult<Self> {
        Ok(Self { rest: RestClient::new(RemoteSystem::Sink, base_url)?, seller_id: seller_id.into() })
    }

    fn url(&self, segments: &[&str]) -> SyncResult<reqwest::Url> {
        self.rest.endpoint(segments).map_err(|e| e.classify(RemoteSystem::Sink))
    }
}

#[async_trait]
impl SinkPort for MarketplaceRestClient {
    async fn list_active_items(
        &self,
        token: &AccessToken,
        offset: usize,
        limit: usize,
    ) -> SyncResult<ListingPage> {
        let url = self.url(&["users", &self.seller_id, "items", "search"])?;
        let request = self
            .rest
            .http()
            .get(url)
            .query(&[("status", "active".to_string()), ("offset", offset.to_string()), ("limit", limit.to_string())])
            .bearer_auth(token.expose());

        let response: SearchResponse = self.rest.send_json(request).await?;
        debug!(offset, returned = response.results.len(), total = response.paging.total, "Listing page fetched");
        Ok(response.into_page())
    }

    async fn fetch_item(&self, handle: &ListingHandle, token: &AccessToken) -> SyncResult<SinkItem> {
        let url = self.url(&["items", handle.as_str()])?;
        let request = self.rest.http().get(url).bearer_auth(token.expose());
        self.rest.send_json(request).await
    }

    async fn update_quantity(
        &self,
        handle: &ListingHandle,
        quantity: Quantity,
        token: &AccessToken,
    ) -> SyncResult<()> {
        let url = self.url(&["items", handle.as_str()])?;
        let request = self
            .rest
            .http()
            .put(url)
            .json(&QuantityUpdate { available_quantity: quantity.units() })
            .bearer_auth(token.expose());

        let _ack: serde_json::Value = self.rest.send_json(request).await?;
        Ok(())
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// Active-items search response.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<String>,
    paging: Paging,
}

#[derive(Debug, Deserialize)]
struct Paging {
    total: usize,
}

impl SearchResponse {
    fn into_page(self) -> ListingPage {
        let handles = self
            .results
            .into_iter()
            .filter_map(|raw| match ListingHandle::new(raw) {
                Ok(handle) => Some(handle),
                Err(e) => {
                    warn!(error = %e, "Ignoring malformed listing handle");
                    None
                },
            })
            .collect();
        ListingPage { handles, total: self.paging.total }
    }
}

/// Quantity update body.
#[derive(Debug, Serialize)]
struct QuantityUpdate {
    available_quantity: u64,
}

// =============================================================================
// Tests
// =============================================================================
