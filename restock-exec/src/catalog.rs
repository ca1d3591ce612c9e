//! Sink catalog index.
//!
//! Pages through the marketplace's active listings once per run, resolves
//! each listing's identifier and keeps the first listing seen for every
//! identifier. The finished index is shared read-only by every concurrent
//! item evaluation of the run.
//!
//! # Pagination
//!
//! ```text
//! offset = 0
//! loop:
//!   page = list_active_items(offset, page_size)
//!   stop if page is empty
//!   fetch every handle on the page concurrently
//!   offset += page.len()
//!   stop if page.len() < page_size or offset >= page.total
//! ```
//!
//! `page.total` is trusted as reported on each page. Listings added or
//! removed mid-scan may be missed or seen twice; duplicates then collapse
//! under first-seen-wins.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use restock_domain::{
    Identifier, ListingHandle, Quantity, SinkItem, SinkListingSummary, UnlinkableListing,
};
use restock_engine::IdentifierResolver;

use crate::error::SyncResult;
use crate::ports::{CredentialProvider, SinkPort};

/// Default number of handles requested per page.
pub const DEFAULT_PAGE_SIZE: usize = 50;

// =============================================================================
// Catalog Index
// =============================================================================

/// Identifier → listing map, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct CatalogIndex {
    entries: HashMap<Identifier, SinkListingSummary>,
    order: Vec<Identifier>,
    unlinkable: Vec<UnlinkableListing>,
    duplicates: usize,
}

impl CatalogIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a listing unless its identifier is already indexed.
    ///
    /// Returns `false` for a duplicate; the earlier listing is kept.
    pub fn insert(&mut self, summary: SinkListingSummary) -> bool {
        if self.entries.contains_key(&summary.identifier) {
            self.duplicates += 1;
            return false;
        }
        self.order.push(summary.identifier.clone());
        self.entries.insert(summary.identifier.clone(), summary);
        true
    }

    /// Record a listing that could not be indexed.
    pub fn mark_unlinkable(&mut self, handle: ListingHandle, reason: impl Into<String>) {
        self.unlinkable.push(UnlinkableListing { handle, reason: reason.into() });
    }

    /// Listing indexed under `identifier`.
    pub fn get(&self, identifier: &Identifier) -> Option<&SinkListingSummary> {
        self.entries.get(identifier)
    }

    /// Indexed identifiers in first-seen order.
    pub fn identifiers(&self) -> &[Identifier] {
        &self.order
    }

    /// Listings left out of the index.
    pub fn unlinkable(&self) -> &[UnlinkableListing] {
        &self.unlinkable
    }

    /// Listings dropped because their identifier was already indexed.
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// Sink Catalog
// =============================================================================

/// Builds the [`CatalogIndex`] at most once.
///
/// A `SinkCatalog` lives for one run: the first `build()` scans the
/// marketplace, later calls return the same index without remote calls.
pub struct SinkCatalog<K: SinkPort> {
    sink: Arc<K>,
    credentials: Arc<dyn CredentialProvider>,
    resolver: IdentifierResolver,
    page_size: usize,
    index: OnceCell<Arc<CatalogIndex>>,
}

impl<K: SinkPort> SinkCatalog<K> {
    /// Create a catalog over a sink port.
    pub fn new(
        sink: Arc<K>,
        credentials: Arc<dyn CredentialProvider>,
        resolver: IdentifierResolver,
        page_size: usize,
    ) -> Self {
        Self { sink, credentials, resolver, page_size: page_size.max(1), index: OnceCell::new() }
    }

    /// Check if the index has been built.
    pub fn is_built(&self) -> bool {
        self.index.initialized()
    }

    /// Build the index, or return the one already built.
    ///
    /// # Errors
    ///
    /// A failed page request or credential fetch aborts the build. Failed
    /// fetches of individual listings do not; those listings are recorded
    /// as unlinkable.
    pub async fn build(&self) -> SyncResult<Arc<CatalogIndex>> {
        self.index.get_or_try_init(|| self.scan()).await.cloned()
    }

    async fn scan(&self) -> SyncResult<Arc<CatalogIndex>> {
        let mut index = CatalogIndex::new();
        let mut offset = 0;

        loop {
            let token = self.credentials.credential().await?;
            let page = match self.sink.list_active_items(&token, offset, self.page_size).await {
                Ok(page) => page,
                Err(e) => {
                    if e.is_unauthorized() {
                        self.credentials.invalidate();
                    }
                    warn!(offset, error = %e, "Failed to list active listings");
                    return Err(e);
                },
            };

            if page.handles.is_empty() {
                break;
            }

            let fetched = page.handles.len();
            let records =
                join_all(page.handles.iter().map(|handle| self.sink.fetch_item(handle, &token))).await;

            for (handle, record) in page.handles.into_iter().zip(records) {
                match record {
                    Ok(item) => self.index_item(&mut index, item),
                    Err(e) => {
                        warn!(handle = %handle, error = %e, "Listing fetch failed, skipping");
                        index.mark_unlinkable(handle, e.to_string());
                    },
                }
            }

            offset += fetched;
            debug!(offset, total = page.total, "Catalog page indexed");
            if fetched < self.page_size || offset >= page.total {
                break;
            }
        }

        info!(
            indexed = index.len(),
            unlinkable = index.unlinkable().len(),
            duplicates = index.duplicates(),
            "Catalog index built"
        );
        Ok(Arc::new(index))
    }

    fn index_item(&self, index: &mut CatalogIndex, item: SinkItem) {
        let Some(identifier) = self.resolver.resolve(&item) else {
            warn!(handle = %item.id, "Listing has no seller identifier");
            index.mark_unlinkable(item.id, "no seller identifier");
            return;
        };

        let summary = SinkListingSummary {
            identifier,
            current_quantity: Quantity::from_signed(item.available_quantity)
                .unwrap_or_else(|_| Quantity::zero()),
            handle: item.id,
            display_name: item.title,
            status: item.status,
        };

        let (identifier, handle) = (summary.identifier.clone(), summary.handle.clone());
        if !index.insert(summary) {
            warn!(identifier = %identifier, handle = %handle, "Duplicate identifier, keeping first listing");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
