//! Stub implementations for testing.
//!
//! These implementations simulate the ERP, the marketplace and their token
//! endpoints without making real API calls. Failures and latency are
//! scripted per identifier or handle so tests can reproduce throttling and
//! out-of-order completion deterministically.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use restock_domain::{
    AccessToken, Identifier, IssuedToken, ItemAttribute, ListingHandle, ListingStatus, Quantity,
    RemoteSystem, SinkItem,
};
use restock_engine::SELLER_SKU_ATTRIBUTE;

use crate::credentials::{Clock, SystemClock};
use crate::error::{SyncError, SyncResult};
use crate::ports::{ListingPage, SinkPort, SourcePort, SourceProductPayload, TokenIssuer};

// =============================================================================
// In-flight gauge
// =============================================================================

/// Tracks concurrent calls and the highest concurrency observed.
#[derive(Debug, Default)]
pub struct InFlightGauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlightGauge {
    /// Mark a call as started; the guard marks it finished on drop.
    pub fn enter(&self) -> InFlightGuard<'_> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        InFlightGuard { gauge: self }
    }

    /// Highest number of simultaneous calls seen.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Calls currently in flight.
    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }
}

/// RAII marker for one in-flight call.
pub struct InFlightGuard<'a> {
    gauge: &'a InFlightGauge,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.gauge.current.fetch_sub(1, Ordering::SeqCst);
    }
}

fn pop_failure(queue: &RwLock<HashMap<String, VecDeque<SyncError>>>, key: &str) -> Option<SyncError> {
    let mut queues = queue.write().unwrap();
    queues.get_mut(key).and_then(|failures| failures.pop_front())
}

fn push_failure(queue: &RwLock<HashMap<String, VecDeque<SyncError>>>, key: &str, error: SyncError) {
    let mut queues = queue.write().unwrap();
    queues.entry(key.to_string()).or_default().push_back(error);
}

// =============================================================================
// Stub Source
// =============================================================================

/// Stub ERP for testing.
///
/// Products are keyed by identifier. Unknown identifiers answer `NotFound`.
#[derive(Default)]
pub struct StubSource {
    /// Products by identifier
    products: RwLock<HashMap<String, SourceProductPayload>>,
    /// Scripted failures by identifier, consumed in order
    failures: RwLock<HashMap<String, VecDeque<SyncError>>>,
    /// Artificial latency by identifier
    latency: RwLock<HashMap<String, Duration>>,
    /// Total fetch calls
    calls: AtomicUsize,
    in_flight: InFlightGauge,
}

impl StubSource {
    /// Create an empty stub ERP.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a product whose stock is a single warehouse balance.
    pub fn insert(&self, identifier: &str, quantity: u64) {
        self.insert_payload(SourceProductPayload {
            code: identifier.to_string(),
            description: format!("Product {}", identifier),
            unit: Some("UN".to_string()),
            price: None,
            stock: serde_json::json!([[{ "warehouse": "MAIN", "balance": quantity }]]),
        });
    }

    /// Register a raw product payload.
    pub fn insert_payload(&self, payload: SourceProductPayload) {
        let mut products = self.products.write().unwrap();
        products.insert(payload.code.clone(), payload);
    }

    /// Remove a product so lookups answer `NotFound`.
    pub fn remove(&self, identifier: &str) {
        self.products.write().unwrap().remove(identifier);
    }

    /// Queue a failure for the next fetch of `identifier`.
    pub fn fail_next(&self, identifier: &str, error: SyncError) {
        push_failure(&self.failures, identifier, error);
    }

    /// Delay every fetch of `identifier`.
    pub fn set_latency(&self, identifier: &str, latency: Duration) {
        self.latency.write().unwrap().insert(identifier.to_string(), latency);
    }

    /// Number of fetch calls made.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of concurrent fetches observed.
    pub fn peak_in_flight(&self) -> usize {
        self.in_flight.peak()
    }
}

#[async_trait]
impl SourcePort for StubSource {
    async fn fetch_product(
        &self,
        identifier: &Identifier,
        _token: &AccessToken,
    ) -> SyncResult<SourceProductPayload> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let _guard = self.in_flight.enter();

        let latency = self.latency.read().unwrap().get(identifier.as_str()).copied();
        match latency {
            Some(latency) => tokio::time::sleep(latency).await,
            None => tokio::task::yield_now().await,
        }

        if let Some(error) = pop_failure(&self.failures, identifier.as_str()) {
            return Err(error);
        }

        let products = self.products.read().unwrap();
        products
            .get(identifier.as_str())
            .cloned()
            .ok_or_else(|| SyncError::not_found(RemoteSystem::Source, identifier.as_str()))
    }
}

// =============================================================================
// Stub Sink
// =============================================================================

/// Stub marketplace for testing.
///
/// Keeps listings in insertion order so pagination is stable. Quantity
/// updates are applied to the stored listing and recorded.
#[derive(Default)]
pub struct StubSink {
    /// Listings in insertion order
    items: RwLock<Vec<SinkItem>>,
    /// Scripted fetch failures by handle
    fetch_failures: RwLock<HashMap<String, VecDeque<SyncError>>>,
    /// Scripted update failures by handle
    update_failures: RwLock<HashMap<String, VecDeque<SyncError>>>,
    /// Scripted listing failures
    list_failures: RwLock<VecDeque<SyncError>>,
    /// Every acknowledged update, in call order
    updates: RwLock<Vec<(ListingHandle, Quantity)>>,
    list_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
}

impl StubSink {
    /// Create an empty stub marketplace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an active listing linked through the custom field.
    pub fn listing(handle: &str, identifier: &str, quantity: i64) -> SinkItem {
        SinkItem {
            id: ListingHandle::new(handle).unwrap(),
            title: format!("Listing {}", handle),
            available_quantity: quantity,
            status: ListingStatus::Active,
            seller_custom_field: Some(identifier.to_string()),
            attributes: Vec::new(),
        }
    }

    /// Build an active listing linked only through the `SELLER_SKU` attribute.
    pub fn listing_with_sku(handle: &str, sku: &str, quantity: i64) -> SinkItem {
        SinkItem {
            seller_custom_field: None,
            attributes: vec![ItemAttribute {
                id: SELLER_SKU_ATTRIBUTE.to_string(),
                value_name: Some(sku.to_string()),
            }],
            ..Self::listing(handle, sku, quantity)
        }
    }

    /// Build an active listing with no seller identifier at all.
    pub fn unlinked(handle: &str, quantity: i64) -> SinkItem {
        SinkItem { seller_custom_field: None, ..Self::listing(handle, "", quantity) }
    }

    /// Add a listing.
    pub fn insert(&self, item: SinkItem) {
        self.items.write().unwrap().push(item);
    }

    /// Current stored quantity of a listing.
    pub fn quantity_of(&self, handle: &str) -> Option<i64> {
        let items = self.items.read().unwrap();
        items.iter().find(|item| item.id.as_str() == handle).map(|item| item.available_quantity)
    }

    /// Queue a failure for the next fetch of `handle`.
    pub fn fail_next_fetch(&self, handle: &str, error: SyncError) {
        push_failure(&self.fetch_failures, handle, error);
    }

    /// Queue a failure for the next update of `handle`.
    pub fn fail_next_update(&self, handle: &str, error: SyncError) {
        push_failure(&self.update_failures, handle, error);
    }

    /// Queue a failure for the next page request.
    pub fn fail_next_list(&self, error: SyncError) {
        self.list_failures.write().unwrap().push_back(error);
    }

    /// Acknowledged updates in call order.
    pub fn updates(&self) -> Vec<(ListingHandle, Quantity)> {
        self.updates.read().unwrap().clone()
    }

    /// Number of acknowledged updates.
    pub fn update_count(&self) -> usize {
        self.updates.read().unwrap().len()
    }

    /// Number of page requests made.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of full-record fetches made.
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SinkPort for StubSink {
    async fn list_active_items(
        &self,
        _token: &AccessToken,
        offset: usize,
        limit: usize,
    ) -> SyncResult<ListingPage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.list_failures.write().unwrap().pop_front() {
            return Err(error);
        }

        let items = self.items.read().unwrap();
        let active: Vec<&SinkItem> =
            items.iter().filter(|item| item.status == ListingStatus::Active).collect();

        Ok(ListingPage {
            handles: active.iter().skip(offset).take(limit).map(|item| item.id.clone()).collect(),
            total: active.len(),
        })
    }

    async fn fetch_item(&self, handle: &ListingHandle, _token: &AccessToken) -> SyncResult<SinkItem> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = pop_failure(&self.fetch_failures, handle.as_str()) {
            return Err(error);
        }

        let items = self.items.read().unwrap();
        items
            .iter()
            .find(|item| &item.id == handle)
            .cloned()
            .ok_or_else(|| SyncError::not_found(RemoteSystem::Sink, handle.as_str()))
    }

    async fn update_quantity(
        &self,
        handle: &ListingHandle,
        quantity: Quantity,
        _token: &AccessToken,
    ) -> SyncResult<()> {
        tokio::task::yield_now().await;
        if let Some(error) = pop_failure(&self.update_failures, handle.as_str()) {
            return Err(error);
        }

        {
            let mut items = self.items.write().unwrap();
            let item = items
                .iter_mut()
                .find(|item| &item.id == handle)
                .ok_or_else(|| SyncError::not_found(RemoteSystem::Sink, handle.as_str()))?;
            item.available_quantity = quantity.units() as i64;
        }

        self.updates.write().unwrap().push((handle.clone(), quantity));
        tracing::debug!(handle = %handle, quantity = quantity.units(), "Stub: quantity updated");
        Ok(())
    }
}

// =============================================================================
// Stub Issuer
// =============================================================================

/// Stub token endpoint.
///
/// Issues `"{system}-token-{n}"` tokens valid for a fixed TTL from the
/// injected clock's current time.
pub struct StubIssuer {
    system: RemoteSystem,
    clock: Arc<dyn Clock>,
    ttl: ChronoDuration,
    issued: AtomicU64,
    fail_next: RwLock<Option<SyncError>>,
}

impl StubIssuer {
    /// Create an issuer bound to a clock.
    pub fn new(system: RemoteSystem, clock: Arc<dyn Clock>, ttl: ChronoDuration) -> Self {
        Self { system, clock, ttl, issued: AtomicU64::new(0), fail_next: RwLock::new(None) }
    }

    /// Issuer on the wall clock with one-hour tokens.
    pub fn hourly(system: RemoteSystem) -> Self {
        Self::new(system, Arc::new(SystemClock), ChronoDuration::hours(1))
    }

    /// Number of tokens issued so far.
    pub fn issued(&self) -> u64 {
        self.issued.load(Ordering::SeqCst)
    }

    /// Configure the next issue to fail.
    pub fn fail_next(&self, error: SyncError) {
        *self.fail_next.write().unwrap() = Some(error);
    }
}

#[async_trait]
impl TokenIssuer for StubIssuer {
    fn system(&self) -> RemoteSystem {
        self.system
    }

    async fn issue(&self) -> SyncResult<IssuedToken> {
        if let Some(error) = self.fail_next.write().unwrap().take() {
            return Err(error);
        }

        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(IssuedToken {
            token: AccessToken::new(format!("{}-token-{}", self.system, n)),
            expires_at: self.clock.now() + self.ttl,
        })
    }
}

// =============================================================================
// Manual Clock
// =============================================================================

/// Clock that only moves when told to.
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: RwLock::new(start) }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: ChronoDuration) {
        let mut now = self.now.write().unwrap();
        *now += by;
    }

    /// Jump to an absolute time.
    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.write().unwrap() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> AccessToken {
        AccessToken::new("test")
    }

    #[tokio::test]
    async fn test_stub_source_lookup_and_not_found() {
        let source = StubSource::new();
        source.insert("SKU-1", 4);

        let payload = source.fetch_product(&Identifier::new("SKU-1").unwrap(), &token()).await.unwrap();
        assert_eq!(payload.code, "SKU-1");

        let err = source
            .fetch_product(&Identifier::new("SKU-404").unwrap(), &token())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_stub_source_failures_are_consumed_in_order() {
        let source = StubSource::new();
        source.insert("SKU-1", 4);
        source.fail_next("SKU-1", SyncError::rate_limited(RemoteSystem::Source, "429", None));
        source.fail_next("SKU-1", SyncError::unavailable(RemoteSystem::Source, "503"));

        let id = Identifier::new("SKU-1").unwrap();
        assert!(source.fetch_product(&id, &token()).await.unwrap_err().is_rate_limited());
        assert!(matches!(
            source.fetch_product(&id, &token()).await.unwrap_err(),
            SyncError::ServerUnavailable { .. }
        ));
        assert!(source.fetch_product(&id, &token()).await.is_ok());
    }

    #[tokio::test]
    async fn test_stub_sink_paginates_active_only() {
        let sink = StubSink::new();
        for i in 0..5 {
            sink.insert(StubSink::listing(&format!("MLB{}", i), &format!("SKU-{}", i), 1));
        }
        sink.insert(SinkItem { status: ListingStatus::Paused, ..StubSink::listing("MLB9", "SKU-9", 1) });

        let page = sink.list_active_items(&token(), 0, 3).await.unwrap();
        assert_eq!(page.handles.len(), 3);
        assert_eq!(page.total, 5);

        let page = sink.list_active_items(&token(), 3, 3).await.unwrap();
        assert_eq!(page.handles.len(), 2);
        assert_eq!(page.handles[1].as_str(), "MLB4");
    }

    #[tokio::test]
    async fn test_stub_sink_update_is_stored() {
        let sink = StubSink::new();
        sink.insert(StubSink::listing("MLB1", "SKU-1", 2));

        let handle = ListingHandle::new("MLB1").unwrap();
        sink.update_quantity(&handle, Quantity::new(9), &token()).await.unwrap();

        assert_eq!(sink.quantity_of("MLB1"), Some(9));
        assert_eq!(sink.updates(), vec![(handle, Quantity::new(9))]);
    }

    #[test]
    fn test_manual_clock_advances() {
        let start = Utc::now();
        let clock = ManualClock::new(start);
        clock.advance(ChronoDuration::seconds(90));
        assert_eq!(clock.now(), start + ChronoDuration::seconds(90));
    }

    #[tokio::test]
    async fn test_in_flight_gauge_tracks_peak() {
        let gauge = InFlightGauge::default();
        {
            let _a = gauge.enter();
            let _b = gauge.enter();
            assert_eq!(gauge.current(), 2);
        }
        assert_eq!(gauge.current(), 0);
        assert_eq!(gauge.peak(), 2);
    }
}
