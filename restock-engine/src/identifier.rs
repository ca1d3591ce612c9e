//! Identifier resolution for marketplace listings.
//!
//! A listing is linked to the ERP through a seller-assigned code. The
//! marketplace's own item id is never used: it cannot be correlated with
//! the ERP.

use restock_domain::{Identifier, SinkItem};
use serde::{Deserialize, Serialize};

/// Attribute id the marketplace uses for the seller SKU.
pub const SELLER_SKU_ATTRIBUTE: &str = "SELLER_SKU";

/// One place an identifier may be read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ExtractionRule {
    /// The listing's free-form seller custom field
    CustomField,
    /// A structured attribute with the given id
    Attribute { id: String },
}

impl ExtractionRule {
    fn extract(&self, item: &SinkItem) -> Option<Identifier> {
        match self {
            ExtractionRule::CustomField => item
                .seller_custom_field
                .as_deref()
                .and_then(|value| Identifier::new(value).ok()),
            ExtractionRule::Attribute { id } => item
                .attributes
                .iter()
                .filter(|attr| attr.id.eq_ignore_ascii_case(id))
                .find_map(|attr| attr.value_name.as_deref().and_then(|v| Identifier::new(v).ok())),
        }
    }
}

/// Resolves identifiers by trying each rule in priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierResolver {
    rules: Vec<ExtractionRule>,
}

impl IdentifierResolver {
    /// Create a resolver with an explicit rule order.
    pub fn new(rules: Vec<ExtractionRule>) -> Self {
        Self { rules }
    }

    /// Rules in the order they are tried.
    pub fn rules(&self) -> &[ExtractionRule] {
        &self.rules
    }

    /// Resolve the shared identifier of a listing.
    ///
    /// Blank values are treated as absent. Returns `None` when no rule
    /// matches; such listings are reported as unlinkable.
    pub fn resolve(&self, item: &SinkItem) -> Option<Identifier> {
        self.rules.iter().find_map(|rule| rule.extract(item))
    }
}

impl Default for IdentifierResolver {
    /// Custom field first, then the `SELLER_SKU` attribute.
    fn default() -> Self {
        Self::new(vec![
            ExtractionRule::CustomField,
            ExtractionRule::Attribute { id: SELLER_SKU_ATTRIBUTE.to_string() },
        ])
    }
}

// =============================================================================
// Tests
// =============================================================================
