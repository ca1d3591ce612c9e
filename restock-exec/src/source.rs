//! Source quantity resolver.
//!
//! Wraps the [`SourcePort`] so a missing product is an ordinary `None`
//! rather than an error, and reduces the raw payload to a [`SourceProduct`].

use std::sync::Arc;

use restock_domain::{AccessToken, Identifier, SourceProduct};
use tracing::debug;

use crate::error::SyncResult;
use crate::ports::SourcePort;

/// Looks products up in the ERP.
pub struct SourceQuantityResolver<S: SourcePort> {
    port: Arc<S>,
}

impl<S: SourcePort> SourceQuantityResolver<S> {
    /// Create a resolver over a source port.
    pub fn new(port: Arc<S>) -> Self {
        Self { port }
    }

    /// Fetch the product for `identifier`.
    ///
    /// # Errors
    ///
    /// Everything except `NotFound` is returned unchanged, so callers keep
    /// the rate-limit hint and the failure classification.
    pub async fn fetch(
        &self,
        identifier: &Identifier,
        token: &AccessToken,
    ) -> SyncResult<Option<SourceProduct>> {
        match self.port.fetch_product(identifier, token).await {
            Ok(payload) => {
                let product = payload.into_product(identifier);
                debug!(
                    identifier = %identifier,
                    quantity = product.quantity_on_hand.units(),
                    "Source product resolved"
                );
                Ok(Some(product))
            },
            Err(e) if e.is_not_found() => {
                debug!(identifier = %identifier, "Product not found in source");
                Ok(None)
            },
            Err(e) => Err(e),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
