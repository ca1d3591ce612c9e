//! Restock Domain Layer
//!
//! Pure domain types with zero I/O dependencies.
//! Contains value objects, entities, and credential primitives shared by
//! the engine, the executor and the connectors.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Public modules
#[allow(missing_docs)]
pub mod entities;
pub mod credentials;
pub mod value_objects;

// Re-export commonly used types
pub use credentials::{AccessToken, ClientCredentials, IssuedToken, RemoteSystem};
pub use entities::{
    Decision, FailureKind, ItemAttribute, Outcome, RunId, RunResult, SinkItem,
    SinkListingSummary, SkipReason, SourceProduct, UnlinkableListing,
};
pub use value_objects::{DomainError, Identifier, ListingHandle, ListingStatus, Quantity};
