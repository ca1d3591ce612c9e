//! Restock Execution Layer
//!
//! Async reconciliation of ERP stock onto marketplace listings.
//!
//! # Architecture
//!
//! ```text
//! Reconciler → Catalog Index ─┐
//!            → Bounded Executor → Source fetch → decide → Sink update
//!            → Retry Controller ┘
//! ```
//!
//! # Components
//!
//! - **Ports**: Traits for the ERP, the marketplace and their token issuers
//! - **Credentials**: Cached, auto-renewing access tokens
//! - **Catalog**: Per-run identifier → listing index
//! - **Executor**: Chunked bounded concurrency with rate-limit cooldown
//! - **Retry**: Re-runs retryable failures at reduced concurrency
//! - **Reconciler**: `sync_one`, `sync_many`, `sync_all`
//! - **Stub**: In-memory implementations for tests and local runs
//!
//! # Example
//!
//! ```rust,ignore
//! use restock_exec::{BatchOptions, CachedCredential, Reconciler, ReconcilerConfig};
//! use std::sync::Arc;
//!
//! let reconciler = Reconciler::new(
//!     source,
//!     sink,
//!     Arc::new(CachedCredential::new(source_issuer)),
//!     Arc::new(CachedCredential::new(sink_issuer)),
//!     ReconcilerConfig::default(),
//! );
//!
//! let report = reconciler.sync_all(BatchOptions::default()).await?;
//! ```

#![warn(clippy::all)]

pub mod catalog;
pub mod credentials;
pub mod error;
pub mod executor;
pub mod ports;
pub mod reconciler;
pub mod retry;
pub mod source;
pub mod stub;

// Re-exports for convenience
pub use catalog::{CatalogIndex, SinkCatalog, DEFAULT_PAGE_SIZE};
pub use credentials::{CachedCredential, Clock, SystemClock, DEFAULT_EXPIRY_SKEW_SECS};
pub use error::{SyncError, SyncResult};
pub use executor::{BoundedExecutor, DEFAULT_RATE_LIMIT_COOLDOWN};
pub use ports::{
    CredentialProvider, ListingPage, SinkPort, SourcePort, SourceProductPayload, TokenIssuer,
};
pub use reconciler::{BatchOptions, Reconciler, ReconcilerConfig, DEFAULT_CONCURRENCY};
pub use retry::{RetryController, RetryPolicy, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY};
pub use source::SourceQuantityResolver;
pub use stub::{InFlightGauge, ManualClock, StubIssuer, StubSink, StubSource};
