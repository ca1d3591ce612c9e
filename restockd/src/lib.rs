//! Restock Daemon Library
//!
//! Runtime host for the stock reconciliation engine.
//!
//! # Architecture
//!
//! ```text
//! HTTP client → API Server → Reconciler → Executor → ERP / Marketplace
//!                                 ↑
//!                      Credential caches (OAuth)
//! ```
//!
//! # Components
//!
//! - **Daemon**: wires connectors, credentials and the API server
//! - **API**: HTTP endpoints to trigger runs
//! - **Config**: Environment-based configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use restockd::{Config, Daemon};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::from_env().expect("Failed to load config");
//!     let daemon = Daemon::new_stub(config);
//!     daemon.run().await.expect("Daemon error");
//! }
//! ```

#![warn(clippy::all)]

pub mod api;
pub mod config;
pub mod daemon;
pub mod error;

// Re-exports for convenience
pub use api::{create_router, ApiState, BatchOverrides};
pub use config::{ApiConfig, Config, Environment, SinkConfig, SourceConfig, SyncConfig};
pub use daemon::Daemon;
pub use error::{DaemonError, DaemonResult};
