//! Cached credentials.
//!
//! One `CachedCredential` per remote system, shared process-wide behind an
//! `Arc`. The token is populated lazily and refreshed once it is within
//! `skew` of its expiry. Concurrent callers that all see an expired token
//! may each refresh; the last write wins and the duplicates are only wasted
//! work.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use restock_domain::{AccessToken, IssuedToken};

use crate::error::SyncResult;
use crate::ports::{CredentialProvider, TokenIssuer};

/// Refresh this long before the reported expiry.
pub const DEFAULT_EXPIRY_SKEW_SECS: i64 = 60;

// =============================================================================
// Clock
// =============================================================================

/// Source of the current time (injectable for tests).
pub trait Clock: Send + Sync {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl<T: Clock + ?Sized> Clock for std::sync::Arc<T> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

// =============================================================================
// Cached Credential
// =============================================================================

/// Auto-renewing token cache over a [`TokenIssuer`].
pub struct CachedCredential<I: TokenIssuer, C: Clock = SystemClock> {
    issuer: I,
    clock: C,
    skew: Duration,
    current: RwLock<Option<IssuedToken>>,
    refreshes: AtomicU64,
}

impl<I: TokenIssuer> CachedCredential<I, SystemClock> {
    /// Create a cache using the wall clock.
    pub fn new(issuer: I) -> Self {
        Self::with_clock(issuer, SystemClock)
    }
}

impl<I: TokenIssuer, C: Clock> CachedCredential<I, C> {
    /// Create a cache with an explicit clock.
    pub fn with_clock(issuer: I, clock: C) -> Self {
        Self {
            issuer,
            clock,
            skew: Duration::seconds(DEFAULT_EXPIRY_SKEW_SECS),
            current: RwLock::new(None),
            refreshes: AtomicU64::new(0),
        }
    }

    /// Override the expiry skew.
    pub fn with_skew(mut self, skew: Duration) -> Self {
        self.skew = skew;
        self
    }

    /// Check if a usable token is cached right now.
    pub fn is_valid(&self) -> bool {
        self.cached().is_some()
    }

    /// Expiry of the cached token, if any.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .map(|issued| issued.expires_at)
    }

    /// Number of times the issuer has been asked for a token.
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }

    /// Fetch a new token regardless of the cached one.
    pub async fn refresh(&self) -> SyncResult<AccessToken> {
        let system = self.issuer.system();
        self.refreshes.fetch_add(1, Ordering::Relaxed);

        let issued = self.issuer.issue().await?;
        let token = issued.token.clone();
        info!(%system, expires_at = %issued.expires_at, "Credential refreshed");

        *self.current.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(issued);
        Ok(token)
    }

    fn cached(&self) -> Option<AccessToken> {
        let now = self.clock.now();
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .filter(|issued| issued.is_valid_at(now, self.skew))
            .map(|issued| issued.token.clone())
    }
}

#[async_trait]
impl<I: TokenIssuer, C: Clock> CredentialProvider for CachedCredential<I, C> {
    async fn credential(&self) -> SyncResult<AccessToken> {
        if let Some(token) = self.cached() {
            return Ok(token);
        }
        debug!(system = %self.issuer.system(), "Cached credential missing or expired");
        self.refresh().await
    }

    fn invalidate(&self) {
        debug!(system = %self.issuer.system(), "Credential invalidated");
        *self.current.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::stub::{ManualClock, StubIssuer};
    use restock_domain::RemoteSystem;
    use std::sync::Arc;

    fn cache(ttl_secs: i64) -> (CachedCredential<Arc<StubIssuer>, Arc<ManualClock>>, Arc<StubIssuer>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let issuer = Arc::new(StubIssuer::new(RemoteSystem::Source, clock.clone(), Duration::seconds(ttl_secs)));
        let cache = CachedCredential::with_clock(issuer.clone(), clock.clone());
        (cache, issuer, clock)
    }

    #[tokio::test]
    async fn test_lazy_initialization() {
        let (cache, issuer, _clock) = cache(3600);

        assert!(!cache.is_valid());
        assert_eq!(issuer.issued(), 0);

        let token = cache.credential().await.unwrap();
        assert_eq!(token.expose(), "source-token-1");
        assert!(cache.is_valid());
        assert_eq!(issuer.issued(), 1);
    }

    #[tokio::test]
    async fn test_cached_token_reused_until_expiry() {
        let (cache, issuer, clock) = cache(3600);

        cache.credential().await.unwrap();
        clock.advance(Duration::minutes(30));
        let token = cache.credential().await.unwrap();

        assert_eq!(token.expose(), "source-token-1");
        assert_eq!(issuer.issued(), 1);
    }

    #[tokio::test]
    async fn test_refresh_inside_skew_window() {
        let (cache, issuer, clock) = cache(3600);

        cache.credential().await.unwrap();
        // 30 s before expiry is inside the 60 s skew
        clock.advance(Duration::seconds(3570));
        assert!(!cache.is_valid());

        let token = cache.credential().await.unwrap();
        assert_eq!(token.expose(), "source-token-2");
        assert_eq!(issuer.issued(), 2);
        assert_eq!(cache.refresh_count(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refresh() {
        let (cache, issuer, _clock) = cache(3600);

        cache.credential().await.unwrap();
        cache.invalidate();
        assert!(cache.expires_at().is_none());

        cache.credential().await.unwrap();
        assert_eq!(issuer.issued(), 2);
    }

    #[tokio::test]
    async fn test_issue_failure_propagates_and_keeps_cache_empty() {
        let (cache, issuer, _clock) = cache(3600);
        issuer.fail_next(SyncError::rate_limited(RemoteSystem::Source, "slow down", None));

        let err = cache.credential().await.unwrap_err();
        assert!(err.is_rate_limited());
        assert!(!cache.is_valid());

        assert!(cache.credential().await.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_callers_tolerated() {
        let (cache, issuer, _clock) = cache(3600);
        let cache = Arc::new(cache);

        let calls = (0..8).map(|_| {
            let cache = cache.clone();
            async move { cache.credential().await }
        });
        let results = futures_util::future::join_all(calls).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert!(issuer.issued() >= 1);
        assert!(cache.is_valid());
    }
}
