//! Restock Engine Layer
//!
//! Pure decision logic, deterministic, no I/O.
//! Takes lookups and listings → returns decisions and update plans.
//!
//! # Components
//!
//! - **Identifier**: links marketplace listings to ERP products
//! - **Quantity**: reduces the ERP stock breakdown to one total
//! - **Decision**: no-change / would-update / apply / skip / error
//! - **Concurrency**: ceiling and retry concurrency rules
//! - **Aggregate**: run counters and the final report

#![warn(clippy::all)]

pub mod aggregate;
pub mod concurrency;
pub mod decision;
pub mod identifier;
pub mod quantity;

// Re-exports for convenience
pub use aggregate::{aggregate, RunContext, RunStats};
pub use concurrency::{
    clamp_concurrency, retry_concurrency, ConcurrencyPlan, MAX_CONCURRENCY,
    MIN_RETRY_CONCURRENCY, SOFT_CONCURRENCY_LIMIT,
};
pub use decision::{decide, SourceLookup, SyncOptions, UpdatePlan, Verdict};
pub use identifier::{ExtractionRule, IdentifierResolver, SELLER_SKU_ATTRIBUTE};
pub use quantity::{extract_quantity, BALANCE_FIELD};
