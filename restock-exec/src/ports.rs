//! Execution layer port definitions.
//!
//! Ports define the interfaces for the two remote systems and their
//! credential issuers. Adapters implement these ports for specific services
//! (ERP REST, marketplace REST, stub, etc.).

use async_trait::async_trait;
use restock_domain::{
    AccessToken, Identifier, IssuedToken, ListingHandle, Quantity, RemoteSystem, SinkItem,
    SourceProduct,
};
use restock_engine::extract_quantity;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::SyncResult;

// =============================================================================
// Source Port
// =============================================================================

/// Port for the ERP product lookup.
///
/// Implementations:
/// - `StubSource` - In-memory products for testing
/// - `ErpRestClient` - ERP REST API (restock-connectors)
#[async_trait]
pub trait SourcePort: Send + Sync {
    /// Fetch the raw product record for an identifier.
    ///
    /// # Errors
    ///
    /// - `SyncError::NotFound` when the ERP has no such product
    /// - `SyncError::RateLimited` when throttled (with wait hint if sent)
    /// - `SyncError::ServerUnavailable` for 5xx responses
    async fn fetch_product(
        &self,
        identifier: &Identifier,
        token: &AccessToken,
    ) -> SyncResult<SourceProductPayload>;
}

/// Product record as returned by the ERP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceProductPayload {
    /// Product code
    pub code: String,
    /// Product description
    #[serde(default)]
    pub description: String,
    /// Unit of measure (e.g., "UN", "KG")
    #[serde(default)]
    pub unit: Option<String>,
    /// Sale price
    #[serde(default)]
    pub price: Option<Decimal>,
    /// Stock breakdown: array of arrays of balance records
    #[serde(default)]
    pub stock: serde_json::Value,
}

impl SourceProductPayload {
    /// Convert into a domain product, reducing the stock breakdown.
    ///
    /// The requested identifier is kept; the ERP may echo the code with
    /// different casing.
    pub fn into_product(self, identifier: &Identifier) -> SourceProduct {
        SourceProduct {
            identifier: identifier.clone(),
            quantity_on_hand: extract_quantity(&self.stock),
            display_name: self.description,
            unit: self.unit,
            price: self.price,
        }
    }
}

// =============================================================================
// Sink Port
// =============================================================================

/// Port for the marketplace catalog.
///
/// Implementations:
/// - `StubSink` - In-memory listings for testing
/// - `MarketplaceRestClient` - Marketplace REST API (restock-connectors)
#[async_trait]
pub trait SinkPort: Send + Sync {
    /// List handles of active items, one page at a time.
    async fn list_active_items(
        &self,
        token: &AccessToken,
        offset: usize,
        limit: usize,
    ) -> SyncResult<ListingPage>;

    /// Fetch the full listing record.
    async fn fetch_item(&self, handle: &ListingHandle, token: &AccessToken) -> SyncResult<SinkItem>;

    /// Overwrite the listing's available quantity.
    ///
    /// This is the only mutating call the engine makes.
    async fn update_quantity(
        &self,
        handle: &ListingHandle,
        quantity: Quantity,
        token: &AccessToken,
    ) -> SyncResult<()>;
}

/// One page of active listing handles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingPage {
    /// Handles on this page
    pub handles: Vec<ListingHandle>,
    /// Total active items as reported by the marketplace
    pub total: usize,
}

// =============================================================================
// Credential Ports
// =============================================================================

/// Port for obtaining fresh tokens from a remote system.
///
/// Implementations:
/// - `StubIssuer` - Counts issues, configurable TTL
/// - `ErpTokenIssuer` / `MarketplaceTokenIssuer` (restock-connectors)
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    /// System this issuer authenticates against.
    fn system(&self) -> RemoteSystem;

    /// Exchange configured secrets for a new token.
    async fn issue(&self) -> SyncResult<IssuedToken>;
}

#[async_trait]
impl<T: TokenIssuer + ?Sized> TokenIssuer for std::sync::Arc<T> {
    fn system(&self) -> RemoteSystem {
        (**self).system()
    }

    async fn issue(&self) -> SyncResult<IssuedToken> {
        (**self).issue().await
    }
}

/// Port handing out a valid token, refreshing as needed.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Get a currently valid token.
    async fn credential(&self) -> SyncResult<AccessToken>;

    /// Drop the cached token so the next call refreshes.
    fn invalidate(&self);
}

// =============================================================================
// Tests
// =============================================================================
