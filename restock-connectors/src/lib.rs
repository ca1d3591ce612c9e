//! Restock Connectors
//!
//! REST adapters for the ERP (source) and the marketplace (sink), plus
//! their OAuth token issuers. Normalizes HTTP failures into classified
//! `SyncError`s.

#![warn(clippy::all)]

pub mod erp;
pub mod http;
pub mod marketplace;
pub mod oauth;

// Re-exports
pub use erp::ErpRestClient;
pub use http::{parse_retry_after, HttpError, RestClient, REQUEST_TIMEOUT_SECS};
pub use marketplace::MarketplaceRestClient;
pub use oauth::{ErpTokenIssuer, MarketplaceTokenIssuer, DEFAULT_TOKEN_TTL_SECS};
