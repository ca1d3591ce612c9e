//! E2E tests: batch reconciliation against the in-memory stubs.
//!
//! Each test wires a `Reconciler` over `StubSource` and `StubSink` and
//! checks one observable property of a run: ordering, retries, the
//! concurrency ceiling, catalog dedup, dry run and idempotence.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use restock_domain::{FailureKind, Identifier, Outcome, Quantity, RemoteSystem};
use restock_engine::{SyncOptions, MAX_CONCURRENCY};
use restock_exec::{
    BatchOptions, CachedCredential, Reconciler, ReconcilerConfig, SourceProductPayload, StubIssuer,
    StubSink, StubSource, SyncError,
};

// =============================================================================
// Setup
// =============================================================================

struct Harness {
    reconciler: Reconciler<StubSource, StubSink>,
    source: Arc<StubSource>,
    sink: Arc<StubSink>,
}

fn harness() -> Harness {
    let source = Arc::new(StubSource::new());
    let sink = Arc::new(StubSink::new());
    let reconciler = Reconciler::new(
        source.clone(),
        sink.clone(),
        Arc::new(CachedCredential::new(StubIssuer::hourly(RemoteSystem::Source))),
        Arc::new(CachedCredential::new(StubIssuer::hourly(RemoteSystem::Sink))),
        ReconcilerConfig::default(),
    );
    Harness { reconciler, source, sink }
}

/// `n` products with ERP quantity `source_qty` and listings at `sink_qty`.
fn seed(h: &Harness, n: usize, source_qty: u64, sink_qty: i64) -> Vec<Identifier> {
    (0..n)
        .map(|i| {
            let code = format!("SKU-{:03}", i);
            h.source.insert(&code, source_qty);
            h.sink.insert(StubSink::listing(&format!("MLB{:03}", i), &code, sink_qty));
            Identifier::new(&code).unwrap()
        })
        .collect()
}

// =============================================================================
// Ordering
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_output_order_matches_input_under_random_latency() {
    let h = harness();
    let mut identifiers = seed(&h, 30, 8, 2);

    let mut rng = rand::thread_rng();
    for identifier in &identifiers {
        h.source.set_latency(identifier.as_str(), Duration::from_millis(rng.gen_range(0..200)));
    }
    // Caller order differs from catalog order
    identifiers.reverse();

    let options = BatchOptions { concurrency: 7, ..Default::default() };
    let result = h.reconciler.sync_many(identifiers.clone(), options).await.unwrap();

    let order: Vec<Identifier> = result.items.iter().map(|d| d.identifier.clone()).collect();
    assert_eq!(order, identifiers);
    assert_eq!(result.updated, 30);
    assert_eq!(result.errors, 0);
}

// =============================================================================
// Retry
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_rate_limited_items_recover_on_retry() {
    let h = harness();
    let identifiers = seed(&h, 10, 6, 1);

    for position in [3, 7] {
        h.source.fail_next(
            identifiers[position].as_str(),
            SyncError::rate_limited(RemoteSystem::Source, "too many requests", None),
        );
    }

    let result = h.reconciler.sync_many(identifiers.clone(), BatchOptions::default()).await.unwrap();

    assert_eq!(result.errors, 0);
    assert_eq!(result.updated, 10);
    assert_eq!(result.retry_attempts, 1);
    assert_eq!(result.items[3].outcome, Outcome::Updated);
    assert_eq!(result.items[7].outcome, Outcome::Updated);
    assert_eq!(result.items[3].identifier, identifiers[3]);
    assert_eq!(h.sink.update_count(), 10);
}

#[tokio::test(start_paused = true)]
async fn test_persistent_failure_reported_not_fatal() {
    let h = harness();
    let identifiers = seed(&h, 4, 6, 1);

    // First pass plus three retries
    for _ in 0..4 {
        h.source.fail_next(
            identifiers[2].as_str(),
            SyncError::unavailable(RemoteSystem::Source, "HTTP 503"),
        );
    }

    let result = h.reconciler.sync_many(identifiers, BatchOptions::default()).await.unwrap();

    assert_eq!(result.updated, 3);
    assert_eq!(result.errors, 1);
    assert_eq!(result.retry_attempts, 3);
    assert!(matches!(
        result.items[2].outcome,
        Outcome::Error { kind: FailureKind::ServerUnavailable, .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_throttled_update_retried() {
    let h = harness();
    let identifiers = seed(&h, 3, 4, 0);
    h.sink.fail_next_update(
        "MLB001",
        SyncError::rate_limited(RemoteSystem::Sink, "429", Some(Duration::from_secs(1))),
    );

    let result = h.reconciler.sync_many(identifiers, BatchOptions::default()).await.unwrap();

    assert_eq!(result.errors, 0);
    assert_eq!(h.sink.quantity_of("MLB001"), Some(4));
    // One failed write, then three acknowledged ones
    assert_eq!(h.sink.update_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_not_found_is_never_retried() {
    let h = harness();
    let mut identifiers = seed(&h, 2, 4, 0);
    identifiers.push(Identifier::new("SKU-GONE").unwrap());

    let result = h.reconciler.sync_many(identifiers, BatchOptions::default()).await.unwrap();

    assert_eq!(result.skipped, 1);
    assert_eq!(result.retry_attempts, 0);
    // Two found products plus one miss, no second lookup
    assert_eq!(h.source.calls(), 3);
}

// =============================================================================
// Concurrency ceiling
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_concurrency_above_ceiling_is_capped_with_warning() {
    let h = harness();
    let identifiers = seed(&h, 120, 3, 3);
    for identifier in &identifiers {
        h.source.set_latency(identifier.as_str(), Duration::from_millis(20));
    }

    let options = BatchOptions { concurrency: 200, ..Default::default() };
    let result = h.reconciler.sync_many(identifiers, options).await.unwrap();

    assert_eq!(h.source.peak_in_flight(), MAX_CONCURRENCY);
    assert_eq!(result.no_change, 120);
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("capped"));
}

#[tokio::test(start_paused = true)]
async fn test_soft_limit_warns_without_capping() {
    let h = harness();
    let identifiers = seed(&h, 40, 3, 3);
    for identifier in &identifiers {
        h.source.set_latency(identifier.as_str(), Duration::from_millis(5));
    }

    let options = BatchOptions { concurrency: 30, ..Default::default() };
    let result = h.reconciler.sync_many(identifiers, options).await.unwrap();

    assert_eq!(h.source.peak_in_flight(), 30);
    assert!(result.warnings[0].contains("recommended"));
}

// =============================================================================
// Catalog dedup
// =============================================================================

#[tokio::test]
async fn test_duplicate_listing_only_first_updated() {
    let h = harness();
    h.source.insert("SKU-1", 12);
    h.sink.insert(StubSink::listing("MLB1", "SKU-1", 2));
    h.sink.insert(StubSink::listing_with_sku("MLB2", "SKU-1", 2));

    let result = h.reconciler.sync_all(BatchOptions::default()).await.unwrap();

    assert_eq!(result.total_requested, 1);
    assert_eq!(h.sink.quantity_of("MLB1"), Some(12));
    assert_eq!(h.sink.quantity_of("MLB2"), Some(2));
}

// =============================================================================
// Dry run and no-change
// =============================================================================

#[tokio::test]
async fn test_dry_run_never_mutates() {
    let h = harness();
    let identifiers = seed(&h, 5, 9, 1);

    let result = h.reconciler.sync_many(identifiers, BatchOptions::default().dry_run()).await.unwrap();

    assert_eq!(result.updated, 5);
    assert!(result.items.iter().all(|d| d.outcome == Outcome::WouldUpdate));
    assert_eq!(h.sink.update_count(), 0);
    assert_eq!(h.sink.quantity_of("MLB000"), Some(1));
}

#[tokio::test(start_paused = true)]
async fn test_dry_run_skips_retries() {
    let h = harness();
    let identifiers = seed(&h, 2, 9, 1);
    h.source.fail_next(identifiers[0].as_str(), SyncError::unavailable(RemoteSystem::Source, "HTTP 502"));

    let result = h.reconciler.sync_many(identifiers, BatchOptions::default().dry_run()).await.unwrap();

    assert_eq!(result.errors, 1);
    assert_eq!(result.retry_attempts, 0);
}

#[tokio::test]
async fn test_equal_quantities_issue_no_writes() {
    let h = harness();
    let identifiers = seed(&h, 8, 4, 4);

    let result = h.reconciler.sync_many(identifiers, BatchOptions::default()).await.unwrap();

    assert_eq!(result.no_change, 8);
    assert_eq!(h.sink.update_count(), 0);
    assert!(result.is_clean());
}

// =============================================================================
// Idempotence
// =============================================================================

#[tokio::test]
async fn test_sync_one_twice_updates_then_no_change() {
    let h = harness();
    h.source.insert_payload(SourceProductPayload {
        code: "SKU-1".into(),
        description: "Mug".into(),
        unit: Some("UN".into()),
        price: None,
        stock: serde_json::json!([[{ "balance": 3 }, { "balance": 2 }], [{ "balance": 5 }]]),
    });
    h.sink.insert(StubSink::listing("MLB1", "SKU-1", 4));
    let identifier = Identifier::new("SKU-1").unwrap();

    let first = h.reconciler.sync_one(&identifier, SyncOptions::default(), None).await.unwrap();
    let second = h.reconciler.sync_one(&identifier, SyncOptions::default(), None).await.unwrap();

    assert_eq!(first.outcome, Outcome::Updated);
    assert_eq!(first.source_quantity, Some(Quantity::new(10)));
    assert_eq!(second.outcome, Outcome::NoChange);
    assert_eq!(h.sink.update_count(), 1);
}
