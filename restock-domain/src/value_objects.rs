//! Value Objects for the Restock Domain
//!
//! Immutable, validated domain primitives.
//! All value objects enforce invariants at construction time.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Domain errors for value object validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// Identifier must be a non-blank string
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Quantity must be a non-negative integer
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    /// Listing handle must be non-blank
    #[error("Invalid listing handle: {0}")]
    InvalidHandle(String),

    /// Batch could not be accepted
    #[error("Invalid batch: {0}")]
    InvalidBatch(String),
}

// =============================================================================
// Identifier
// =============================================================================

/// Identifier is the product code shared between the ERP and the marketplace.
///
/// # Invariants
/// - Never blank
/// - Surrounding whitespace is stripped
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    /// Create a new Identifier with validation
    ///
    /// # Examples
    /// ```
    /// # use restock_domain::Identifier;
    /// let id = Identifier::new("  SKU-001 ").unwrap();
    /// assert_eq!(id.as_str(), "SKU-001");
    /// ```
    ///
    /// # Errors
    /// Returns `DomainError::InvalidIdentifier` if the value is blank
    pub fn new(value: impl AsRef<str>) -> Result<Self, DomainError> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            return Err(DomainError::InvalidIdentifier("Identifier must not be blank".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Identifier {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Listing Handle
// =============================================================================

/// Opaque marketplace reference used to read and update a listing
/// (e.g. `MLB1234567890`). Never correlated with the ERP.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ListingHandle(String);

impl ListingHandle {
    /// Create a new handle
    ///
    /// # Errors
    /// Returns `DomainError::InvalidHandle` if the value is blank
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(DomainError::InvalidHandle("Listing handle must not be blank".to_string()));
        }
        Ok(Self(value))
    }

    /// Get the handle as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ListingHandle {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ListingHandle> for String {
    fn from(handle: ListingHandle) -> Self {
        handle.0
    }
}

impl fmt::Display for ListingHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Quantity
// =============================================================================

/// Quantity represents units on hand
///
/// # Invariants
/// - Non-negative whole number
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Quantity(u64);

impl Quantity {
    /// Create a Quantity from a unit count
    pub fn new(units: u64) -> Self {
        Self(units)
    }

    /// Create a zero quantity
    pub fn zero() -> Self {
        Self(0)
    }

    /// Create a Quantity from a signed count reported by a remote system
    ///
    /// # Errors
    /// Returns `DomainError::InvalidQuantity` if value < 0
    pub fn from_signed(value: i64) -> Result<Self, DomainError> {
        u64::try_from(value)
            .map(Self)
            .map_err(|_| DomainError::InvalidQuantity(format!("Quantity must be >= 0, got {}", value)))
    }

    /// Reduce a decimal total to a Quantity.
    ///
    /// Negative totals clamp to zero, fractional totals are floored.
    pub fn from_decimal_floor(value: Decimal) -> Self {
        if value <= Decimal::ZERO {
            return Self::zero();
        }
        Self(value.floor().to_u64().unwrap_or(u64::MAX))
    }

    /// Get the underlying unit count
    pub fn units(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Listing Status
// =============================================================================

/// Lifecycle state of a marketplace listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    /// Listed and purchasable
    Active,
    /// Temporarily hidden by the seller or the marketplace
    Paused,
    /// Finished, no longer purchasable
    Closed,
    /// Under marketplace review
    UnderReview,
    /// Any status the marketplace adds later
    #[serde(other)]
    Unknown,
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListingStatus::Active => write!(f, "active"),
            ListingStatus::Paused => write!(f, "paused"),
            ListingStatus::Closed => write!(f, "closed"),
            ListingStatus::UnderReview => write!(f, "under_review"),
            ListingStatus::Unknown => write!(f, "unknown"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
