//! Domain Entities for Restock
//!
//! Listings, products, per-item decisions and the run report.

use crate::value_objects::{Identifier, ListingHandle, ListingStatus, Quantity};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Unique identifier for a reconciliation run
pub type RunId = Uuid;

// =============================================================================
// Marketplace (sink) records
// =============================================================================

/// Full listing record as returned by the marketplace.
///
/// Only the fields the engine reads are modeled; everything else in the
/// payload is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkItem {
    pub id: ListingHandle,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub available_quantity: i64,
    #[serde(default = "unknown_status")]
    pub status: ListingStatus,
    /// Seller-assigned free-form code (highest priority identifier source)
    #[serde(default)]
    pub seller_custom_field: Option<String>,
    /// Structured attributes (e.g. `SELLER_SKU`)
    #[serde(default)]
    pub attributes: Vec<ItemAttribute>,
}

fn unknown_status() -> ListingStatus {
    ListingStatus::Unknown
}

/// Structured listing attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAttribute {
    pub id: String,
    #[serde(default)]
    pub value_name: Option<String>,
}

/// Listing entry held by the catalog index.
///
/// Immutable once indexed; the index is read-only for the rest of the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkListingSummary {
    pub identifier: Identifier,
    pub handle: ListingHandle,
    pub current_quantity: Quantity,
    pub display_name: String,
    pub status: ListingStatus,
}

/// Listing that could not be placed in the catalog index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlinkableListing {
    pub handle: ListingHandle,
    pub reason: String,
}

// =============================================================================
// ERP (source) records
// =============================================================================

/// Product as seen by the ERP at evaluation time.
///
/// Only `quantity_on_hand` is relied upon for correctness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceProduct {
    pub identifier: Identifier,
    pub quantity_on_hand: Quantity,
    pub display_name: String,
    pub unit: Option<String>,
    pub price: Option<Decimal>,
}

// =============================================================================
// Decision
// =============================================================================

/// Why an item was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NotInSource,
    NotInSink,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotInSource => write!(f, "not found in source"),
            SkipReason::NotInSink => write!(f, "not found in sink"),
        }
    }
}

/// Classification of a failed item, decided at the port boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Remote system throttled the call
    RateLimited,
    /// Remote system answered 5xx or was unreachable
    ServerUnavailable,
    /// Unclassified failure, assumed transient
    Transient,
    /// Remote system refused the request; retrying cannot help
    Terminal,
}

impl FailureKind {
    /// Whether the retry controller should resubmit the item.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FailureKind::Terminal)
    }
}

/// Outcome of evaluating one identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// Quantities already match
    NoChange,
    /// Quantities differ, dry run prevented the update
    WouldUpdate,
    /// Marketplace quantity overwritten with the ERP quantity
    Updated,
    /// Identifier missing on one side
    Skipped { reason: SkipReason },
    /// Lookup or update failed
    Error { kind: FailureKind, message: String },
}

impl Outcome {
    /// Check if this is an error outcome
    pub fn is_error(&self) -> bool {
        matches!(self, Outcome::Error { .. })
    }

    /// Check if this is an error the retry controller should resubmit
    pub fn is_retryable_error(&self) -> bool {
        matches!(self, Outcome::Error { kind, .. } if kind.is_retryable())
    }
}

/// Per-item result, always carrying whatever quantities were known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub identifier: Identifier,
    #[serde(flatten)]
    pub outcome: Outcome,
    pub source_quantity: Option<Quantity>,
    pub sink_quantity: Option<Quantity>,
}

impl Decision {
    /// Create a decision with no known quantities.
    pub fn new(identifier: Identifier, outcome: Outcome) -> Self {
        Self {
            identifier,
            outcome,
            source_quantity: None,
            sink_quantity: None,
        }
    }

    /// Create an error decision.
    pub fn error(identifier: Identifier, kind: FailureKind, message: impl Into<String>) -> Self {
        Self::new(identifier, Outcome::Error { kind, message: message.into() })
    }

    /// Attach the known quantities.
    pub fn with_quantities(mut self, source: Option<Quantity>, sink: Option<Quantity>) -> Self {
        self.source_quantity = source;
        self.sink_quantity = sink;
        self
    }

    /// Check if this decision failed
    pub fn is_error(&self) -> bool {
        self.outcome.is_error()
    }
}

// =============================================================================
// Run Result
// =============================================================================

/// Final report of one reconciliation run.
///
/// Counters always sum to `total_requested`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: RunId,
    pub total_requested: usize,
    pub updated: usize,
    pub no_change: usize,
    pub skipped: usize,
    pub errors: usize,
    /// Decisions in the caller's input order
    pub items: Vec<Decision>,
    #[serde(with = "duration_millis", rename = "elapsed_ms")]
    pub elapsed: Duration,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Retry passes actually executed
    pub retry_attempts: u32,
    /// Non-fatal notices (e.g. clamped concurrency)
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Marketplace listings left out of the index (only for catalog-wide runs)
    #[serde(default)]
    pub unlinkable: Vec<UnlinkableListing>,
}

impl RunResult {
    /// Items processed per second over the whole run.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= f64::EPSILON {
            return self.total_requested as f64;
        }
        self.total_requested as f64 / secs
    }

    /// Check whether every item settled without error
    pub fn is_clean(&self) -> bool {
        self.errors == 0
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

// =============================================================================
// Tests
// =============================================================================
