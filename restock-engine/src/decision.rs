//! Decision function: what to do with one identifier.
//!
//! Pure: takes the ERP lookup, the indexed listing and the run options and
//! returns either a settled [`Decision`] or an [`UpdatePlan`] the executor
//! must apply to the marketplace.
//!
//! # Precedence
//!
//! ```text
//! source not found   → Skipped(not found in source)
//! source failed      → Error(kind, message)
//! no listing         → Skipped(not found in sink)
//! equal, not forced  → NoChange
//! dry run            → WouldUpdate
//! otherwise          → apply (Updated | Error)
//! ```

use restock_domain::{
    Decision, FailureKind, Identifier, ListingHandle, Outcome, Quantity, SinkListingSummary,
    SkipReason, SourceProduct,
};
use serde::{Deserialize, Serialize};

/// Per-item options, checked once per item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOptions {
    /// Compute decisions without touching the marketplace
    #[serde(default)]
    pub dry_run: bool,
    /// Overwrite even when quantities already match
    #[serde(default)]
    pub force_update: bool,
}

/// Result of looking an identifier up in the ERP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLookup {
    Found(SourceProduct),
    NotFound,
    Failed { kind: FailureKind, message: String },
}

impl SourceLookup {
    fn quantity(&self) -> Option<Quantity> {
        match self {
            SourceLookup::Found(product) => Some(product.quantity_on_hand),
            _ => None,
        }
    }
}

impl From<Option<SourceProduct>> for SourceLookup {
    fn from(product: Option<SourceProduct>) -> Self {
        product.map(SourceLookup::Found).unwrap_or(SourceLookup::NotFound)
    }
}

/// Marketplace write the executor must perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePlan {
    pub identifier: Identifier,
    pub handle: ListingHandle,
    /// Value written to the marketplace (full overwrite)
    pub target: Quantity,
    pub current: Quantity,
}

impl UpdatePlan {
    /// Decision once the marketplace acknowledged the write.
    pub fn updated(self) -> Decision {
        Decision::new(self.identifier, Outcome::Updated)
            .with_quantities(Some(self.target), Some(self.current))
    }

    /// Decision when the write itself failed.
    pub fn failed(self, kind: FailureKind, message: impl Into<String>) -> Decision {
        Decision::error(self.identifier, kind, message)
            .with_quantities(Some(self.target), Some(self.current))
    }
}

/// What the decision function concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Nothing left to do
    Settled(Decision),
    /// Apply this write, then settle
    Apply(UpdatePlan),
}

/// Decide what to do with one identifier.
pub fn decide(
    identifier: &Identifier,
    source: &SourceLookup,
    sink: Option<&SinkListingSummary>,
    options: SyncOptions,
) -> Verdict {
    let source_quantity = source.quantity();
    let sink_quantity = sink.map(|listing| listing.current_quantity);
    let settle = |outcome: Outcome| {
        Verdict::Settled(
            Decision::new(identifier.clone(), outcome).with_quantities(source_quantity, sink_quantity),
        )
    };

    let product = match source {
        SourceLookup::NotFound => {
            return settle(Outcome::Skipped { reason: SkipReason::NotInSource })
        },
        SourceLookup::Failed { kind, message } => {
            return settle(Outcome::Error { kind: *kind, message: message.clone() })
        },
        SourceLookup::Found(product) => product,
    };

    let Some(listing) = sink else {
        return settle(Outcome::Skipped { reason: SkipReason::NotInSink });
    };

    if product.quantity_on_hand == listing.current_quantity && !options.force_update {
        return settle(Outcome::NoChange);
    }

    if options.dry_run {
        return settle(Outcome::WouldUpdate);
    }

    Verdict::Apply(UpdatePlan {
        identifier: identifier.clone(),
        handle: listing.handle.clone(),
        target: product.quantity_on_hand,
        current: listing.current_quantity,
    })
}

// =============================================================================
// Tests
// =============================================================================
