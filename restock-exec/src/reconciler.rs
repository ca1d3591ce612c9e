//! Reconciler: the engine's entry points.
//!
//! Wires the catalog index, the source resolver, the decision function, the
//! bounded executor and the retry controller together.
//!
//! # Flow
//!
//! ```text
//! sync_many(ids) ─► build catalog ─► executor pass ─► retry passes ─► aggregate
//!                                       │
//!                        per item: source fetch → decide → (sink update)
//! ```
//!
//! Every `sync_*` call builds its own catalog, so a run never sees listing
//! quantities cached by an earlier run.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use restock_domain::{Decision, Identifier, RunResult};
use restock_engine::{
    aggregate, clamp_concurrency, decide, IdentifierResolver, RunContext, RunStats, SourceLookup,
    SyncOptions, Verdict,
};

use crate::catalog::{CatalogIndex, SinkCatalog, DEFAULT_PAGE_SIZE};
use crate::error::{SyncError, SyncResult};
use crate::executor::{BoundedExecutor, DEFAULT_RATE_LIMIT_COOLDOWN};
use crate::ports::{CredentialProvider, SinkPort, SourcePort};
use crate::retry::{RetryController, RetryPolicy, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY};
use crate::source::SourceQuantityResolver;

/// Default items in flight per chunk.
pub const DEFAULT_CONCURRENCY: usize = 10;

// =============================================================================
// Options
// =============================================================================

/// Options for a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOptions {
    #[serde(flatten)]
    pub sync: SyncOptions,
    /// Requested items in flight (clamped to the ceiling)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Retry attempts after the initial pass
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Wait before each retry attempt
    #[serde(default = "default_retry_delay", rename = "retry_delay_ms", with = "millis")]
    pub retry_delay: Duration,
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_retry_delay() -> Duration {
    DEFAULT_RETRY_DELAY
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            sync: SyncOptions::default(),
            concurrency: DEFAULT_CONCURRENCY,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl BatchOptions {
    /// Same options with `dry_run` set.
    pub fn dry_run(mut self) -> Self {
        self.sync.dry_run = true;
        self
    }

    fn validate(&self) -> SyncResult<()> {
        if self.concurrency == 0 {
            return Err(SyncError::Validation("concurrency must be at least 1".to_string()));
        }
        Ok(())
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Static settings of a reconciler.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Listings requested per catalog page
    pub page_size: usize,
    /// Pause after a throttled chunk
    pub rate_limit_cooldown: Duration,
    /// How listings are linked to ERP products
    pub resolver: IdentifierResolver,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            rate_limit_cooldown: DEFAULT_RATE_LIMIT_COOLDOWN,
            resolver: IdentifierResolver::default(),
        }
    }
}

// =============================================================================
// Reconciler
// =============================================================================

/// Reconciles ERP stock onto marketplace listings.
pub struct Reconciler<S: SourcePort, K: SinkPort> {
    source: SourceQuantityResolver<S>,
    sink: Arc<K>,
    source_credentials: Arc<dyn CredentialProvider>,
    sink_credentials: Arc<dyn CredentialProvider>,
    executor: BoundedExecutor,
    config: ReconcilerConfig,
}

impl<S: SourcePort, K: SinkPort> Reconciler<S, K> {
    /// Create a reconciler.
    pub fn new(
        source: Arc<S>,
        sink: Arc<K>,
        source_credentials: Arc<dyn CredentialProvider>,
        sink_credentials: Arc<dyn CredentialProvider>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            source: SourceQuantityResolver::new(source),
            sink,
            source_credentials,
            sink_credentials,
            executor: BoundedExecutor::new(config.rate_limit_cooldown),
            config,
        }
    }

    /// A fresh, unbuilt catalog for one run.
    pub fn catalog(&self) -> SinkCatalog<K> {
        SinkCatalog::new(
            self.sink.clone(),
            self.sink_credentials.clone(),
            self.config.resolver.clone(),
            self.config.page_size,
        )
    }

    /// Reconcile a single identifier.
    ///
    /// Builds the catalog unless a prebuilt index is supplied.
    ///
    /// # Errors
    ///
    /// Only for failures outside the item itself (catalog build, credential
    /// fetch). Remote failures for the item are reported in the decision.
    pub async fn sync_one(
        &self,
        identifier: &Identifier,
        options: SyncOptions,
        index: Option<Arc<CatalogIndex>>,
    ) -> SyncResult<Decision> {
        let index = match index {
            Some(index) => index,
            None => self.catalog().build().await?,
        };
        let decision = self.evaluate(identifier.clone(), &index, options).await?;
        info!(identifier = %identifier, outcome = ?decision.outcome, "Single sync finished");
        Ok(decision)
    }

    /// Reconcile a batch of identifiers.
    ///
    /// # Errors
    ///
    /// - `SyncError::Validation` for an empty batch, a repeated identifier
    ///   or zero concurrency,
    ///   before any remote call
    /// - the catalog build error, or a run-aborting executor error
    pub async fn sync_many(
        &self,
        identifiers: Vec<Identifier>,
        options: BatchOptions,
    ) -> SyncResult<RunResult> {
        if identifiers.is_empty() {
            return Err(SyncError::Validation("identifiers must not be empty".to_string()));
        }
        let mut seen = HashSet::with_capacity(identifiers.len());
        if let Some(repeated) = identifiers.iter().find(|identifier| !seen.insert(*identifier)) {
            return Err(SyncError::Validation(format!("identifier {} appears more than once", repeated)));
        }
        options.validate()?;

        let index = self.catalog().build().await?;
        self.run_batch(identifiers, &index, options).await
    }

    /// Reconcile every identifier in the marketplace catalog.
    ///
    /// An empty catalog yields an empty report.
    pub async fn sync_all(&self, options: BatchOptions) -> SyncResult<RunResult> {
        options.validate()?;

        let index = self.catalog().build().await?;
        if index.is_empty() {
            warn!("Catalog has no linkable listings, nothing to sync");
        }
        let identifiers = index.identifiers().to_vec();
        self.run_batch(identifiers, &index, options).await
    }

    async fn run_batch(
        &self,
        identifiers: Vec<Identifier>,
        index: &CatalogIndex,
        options: BatchOptions,
    ) -> SyncResult<RunResult> {
        let run_id = Uuid::now_v7();
        let started_at = Utc::now();
        let clock = tokio::time::Instant::now();

        let plan = clamp_concurrency(options.concurrency);
        let mut warnings = Vec::new();
        if let Some(warning) = plan.warning {
            warn!(%run_id, requested = plan.requested, effective = plan.effective, "{}", warning);
            warnings.push(warning);
        }

        info!(
            %run_id,
            items = identifiers.len(),
            concurrency = plan.effective,
            dry_run = options.sync.dry_run,
            force_update = options.sync.force_update,
            "Sync run started"
        );

        let evaluate = |identifier: Identifier| self.evaluate(identifier, index, options.sync);

        let mut decisions = self.executor.run(&identifiers, plan.effective, &evaluate).await?;
        let mut stats = RunStats::from_decisions(&decisions);

        let retry_attempts = if options.sync.dry_run {
            0
        } else {
            let policy = RetryPolicy::new(options.max_retries, options.retry_delay, plan.effective);
            RetryController::new(policy, &self.executor)
                .settle(&mut decisions, &mut stats, &evaluate)
                .await?
        };

        let result = aggregate(
            decisions,
            stats,
            RunContext {
                run_id,
                started_at,
                finished_at: Utc::now(),
                elapsed: clock.elapsed(),
                retry_attempts,
                warnings,
                unlinkable: index.unlinkable().to_vec(),
            },
        );

        info!(
            %run_id,
            updated = result.updated,
            no_change = result.no_change,
            skipped = result.skipped,
            errors = result.errors,
            retry_attempts,
            elapsed_ms = result.elapsed.as_millis() as u64,
            throughput = result.throughput(),
            "Sync run finished"
        );
        Ok(result)
    }

    /// Evaluate one identifier against the index.
    async fn evaluate(
        &self,
        identifier: Identifier,
        index: &CatalogIndex,
        options: SyncOptions,
    ) -> SyncResult<Decision> {
        let token = self.source_credentials.credential().await?;
        let lookup = match self.source.fetch(&identifier, &token).await {
            Ok(product) => SourceLookup::from(product),
            Err(e) => {
                if e.is_unauthorized() {
                    self.source_credentials.invalidate();
                }
                debug!(identifier = %identifier, error = %e, "Source lookup failed");
                SourceLookup::Failed { kind: e.kind(), message: e.to_string() }
            },
        };

        let plan = match decide(&identifier, &lookup, index.get(&identifier), options) {
            Verdict::Settled(decision) => {
                debug!(identifier = %identifier, outcome = ?decision.outcome, "Item settled");
                return Ok(decision);
            },
            Verdict::Apply(plan) => plan,
        };

        let token = self.sink_credentials.credential().await?;
        match self.sink.update_quantity(&plan.handle, plan.target, &token).await {
            Ok(()) => {
                info!(
                    identifier = %identifier,
                    handle = %plan.handle,
                    from = plan.current.units(),
                    to = plan.target.units(),
                    "Listing quantity updated"
                );
                Ok(plan.updated())
            },
            Err(e) => {
                if e.is_unauthorized() {
                    self.sink_credentials.invalidate();
                }
                warn!(identifier = %identifier, handle = %plan.handle, error = %e, "Listing update failed");
                Ok(plan.failed(e.kind(), e.to_string()))
            },
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::CachedCredential;
    use crate::stub::{StubIssuer, StubSink, StubSource};
    use restock_domain::{FailureKind, Outcome, Quantity, RemoteSystem, SkipReason};

    struct Fixture {
        reconciler: Reconciler<StubSource, StubSink>,
        source: Arc<StubSource>,
        sink: Arc<StubSink>,
        source_issuer: Arc<StubIssuer>,
    }

    fn fixture() -> Fixture {
        let source = Arc::new(StubSource::new());
        let sink = Arc::new(StubSink::new());
        let source_issuer = Arc::new(StubIssuer::hourly(RemoteSystem::Source));
        let reconciler = Reconciler::new(
            source.clone(),
            sink.clone(),
            Arc::new(CachedCredential::new(source_issuer.clone())),
            Arc::new(CachedCredential::new(StubIssuer::hourly(RemoteSystem::Sink))),
            ReconcilerConfig::default(),
        );
        Fixture { reconciler, source, sink, source_issuer }
    }

    fn id(code: &str) -> Identifier {
        Identifier::new(code).unwrap()
    }

    #[tokio::test]
    async fn test_sync_one_updates_changed_quantity() {
        let f = fixture();
        f.source.insert("SKU-1", 7);
        f.sink.insert(StubSink::listing("MLB1", "SKU-1", 3));

        let decision = f.reconciler.sync_one(&id("SKU-1"), SyncOptions::default(), None).await.unwrap();

        assert_eq!(decision.outcome, Outcome::Updated);
        assert_eq!(decision.source_quantity, Some(Quantity::new(7)));
        assert_eq!(decision.sink_quantity, Some(Quantity::new(3)));
        assert_eq!(f.sink.quantity_of("MLB1"), Some(7));
    }

    #[tokio::test]
    async fn test_sync_one_equal_quantity_no_mutation() {
        let f = fixture();
        f.source.insert("SKU-1", 5);
        f.sink.insert(StubSink::listing("MLB1", "SKU-1", 5));

        let decision = f.reconciler.sync_one(&id("SKU-1"), SyncOptions::default(), None).await.unwrap();

        assert_eq!(decision.outcome, Outcome::NoChange);
        assert_eq!(f.sink.update_count(), 0);
    }

    #[tokio::test]
    async fn test_sync_one_force_update_writes_equal_quantity() {
        let f = fixture();
        f.source.insert("SKU-1", 5);
        f.sink.insert(StubSink::listing("MLB1", "SKU-1", 5));

        let options = SyncOptions { force_update: true, ..Default::default() };
        let decision = f.reconciler.sync_one(&id("SKU-1"), options, None).await.unwrap();

        assert_eq!(decision.outcome, Outcome::Updated);
        assert_eq!(f.sink.update_count(), 1);
    }

    #[tokio::test]
    async fn test_sync_one_skips() {
        let f = fixture();
        f.source.insert("SKU-1", 5);
        f.sink.insert(StubSink::listing("MLB2", "SKU-2", 1));

        let index = f.reconciler.catalog().build().await.unwrap();

        let missing_in_sink =
            f.reconciler.sync_one(&id("SKU-1"), SyncOptions::default(), Some(index.clone())).await.unwrap();
        assert_eq!(missing_in_sink.outcome, Outcome::Skipped { reason: SkipReason::NotInSink });

        let missing_in_source =
            f.reconciler.sync_one(&id("SKU-2"), SyncOptions::default(), Some(index)).await.unwrap();
        assert_eq!(missing_in_source.outcome, Outcome::Skipped { reason: SkipReason::NotInSource });

        // Prebuilt index reused: one page request in total
        assert_eq!(f.sink.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_sync_one_update_failure_is_decision() {
        let f = fixture();
        f.source.insert("SKU-1", 7);
        f.sink.insert(StubSink::listing("MLB1", "SKU-1", 3));
        f.sink.fail_next_update(
            "MLB1",
            SyncError::Rejected { system: RemoteSystem::Sink, message: "item closed".into() },
        );

        let decision = f.reconciler.sync_one(&id("SKU-1"), SyncOptions::default(), None).await.unwrap();

        assert!(matches!(decision.outcome, Outcome::Error { kind: FailureKind::Terminal, .. }));
        assert_eq!(f.sink.quantity_of("MLB1"), Some(3));
    }

    #[tokio::test]
    async fn test_unauthorized_source_invalidates_credential() {
        let f = fixture();
        f.source.insert("SKU-1", 7);
        f.sink.insert(StubSink::listing("MLB1", "SKU-1", 3));
        f.source.fail_next(
            "SKU-1",
            SyncError::Unauthorized { system: RemoteSystem::Source, message: "token expired".into() },
        );

        let decision = f.reconciler.sync_one(&id("SKU-1"), SyncOptions::default(), None).await.unwrap();
        assert!(matches!(decision.outcome, Outcome::Error { kind: FailureKind::Transient, .. }));
        assert_eq!(f.source_issuer.issued(), 1);

        let decision = f.reconciler.sync_one(&id("SKU-1"), SyncOptions::default(), None).await.unwrap();
        assert_eq!(decision.outcome, Outcome::Updated);
        assert_eq!(f.source_issuer.issued(), 2);
    }

    #[tokio::test]
    async fn test_credential_failure_is_run_error() {
        let f = fixture();
        f.sink.insert(StubSink::listing("MLB1", "SKU-1", 3));
        f.source_issuer.fail_next(SyncError::unavailable(RemoteSystem::Source, "HTTP 503"));

        let err = f
            .reconciler
            .sync_many(vec![id("SKU-1")], BatchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::ServerUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_sync_many_validation_before_remote_calls() {
        let f = fixture();

        let err = f.reconciler.sync_many(Vec::new(), BatchOptions::default()).await.unwrap_err();
        assert!(err.is_validation());

        let options = BatchOptions { concurrency: 0, ..Default::default() };
        let err = f.reconciler.sync_many(vec![id("SKU-1")], options).await.unwrap_err();
        assert!(err.is_validation());

        assert_eq!(f.sink.list_calls(), 0);
        assert_eq!(f.source.calls(), 0);
    }

    #[tokio::test]
    async fn test_sync_many_rejects_repeated_identifier() {
        let f = fixture();
        f.source.insert("SKU-1", 7);
        f.sink.insert(StubSink::listing("MLB1", "SKU-1", 3));

        let err = f
            .reconciler
            .sync_many(vec![id("SKU-1"), id("SKU-2"), id(" SKU-1 ")], BatchOptions::default())
            .await
            .unwrap_err();

        assert!(err.is_validation());
        assert!(err.to_string().contains("SKU-1"));
        assert_eq!(f.sink.list_calls(), 0);
        assert_eq!(f.sink.update_count(), 0);
        assert_eq!(f.sink.quantity_of("MLB1"), Some(3));
    }

    #[tokio::test]
    async fn test_sync_all_uses_catalog_order() {
        let f = fixture();
        for (i, code) in ["SKU-C", "SKU-A", "SKU-B"].iter().enumerate() {
            f.source.insert(code, 9);
            f.sink.insert(StubSink::listing(&format!("MLB{}", i), code, 1));
        }
        f.sink.insert(StubSink::unlinked("MLB9", 1));

        let result = f.reconciler.sync_all(BatchOptions::default()).await.unwrap();

        let order: Vec<&str> = result.items.iter().map(|d| d.identifier.as_str()).collect();
        assert_eq!(order, vec!["SKU-C", "SKU-A", "SKU-B"]);
        assert_eq!(result.updated, 3);
        assert_eq!(result.unlinkable.len(), 1);
    }

    #[tokio::test]
    async fn test_sync_all_empty_catalog() {
        let f = fixture();

        let result = f.reconciler.sync_all(BatchOptions::default()).await.unwrap();

        assert_eq!(result.total_requested, 0);
        assert!(result.items.is_empty());
        assert_eq!(f.source.calls(), 0);
    }

    #[test]
    fn test_batch_options_defaults_from_json() {
        let options: BatchOptions = serde_json::from_str(r#"{"dry_run": true}"#).unwrap();

        assert!(options.sync.dry_run);
        assert!(!options.sync.force_update);
        assert_eq!(options.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(options.max_retries, 3);
        assert_eq!(options.retry_delay, Duration::from_secs(5));

        let options: BatchOptions =
            serde_json::from_str(r#"{"concurrency": 4, "retry_delay_ms": 250}"#).unwrap();
        assert_eq!(options.concurrency, 4);
        assert_eq!(options.retry_delay, Duration::from_millis(250));
    }
}
