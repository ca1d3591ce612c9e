//! Bounded parallel executor.
//!
//! Runs an evaluation over a list of identifiers in consecutive chunks.
//! Every item of a chunk runs concurrently; the next chunk starts only
//! once the whole chunk has resolved, so at most `concurrency` items are
//! ever in flight.
//!
//! # Flow
//!
//! ```text
//! identifiers ─ chunk(concurrency) ─► join_all(evaluate) ─► ordered decisions
//!                                          │
//!                          throttled? ─► cooldown before next chunk
//! ```
//!
//! An evaluation returns `Err` only for failures that are not about the item
//! itself (a credential fetch, for example). A rate-limited one is recorded
//! against the item and the executor cools down; anything else aborts the
//! run.

use std::future::Future;
use std::time::Duration;

use futures_util::future::join_all;
use tracing::{debug, error, warn};

use restock_domain::{Decision, FailureKind, Identifier, Outcome};

use crate::error::SyncResult;

/// Default pause after a throttled chunk.
pub const DEFAULT_RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(2);

/// Executes evaluations chunk by chunk.
#[derive(Debug, Clone, Copy)]
pub struct BoundedExecutor {
    cooldown: Duration,
}

impl Default for BoundedExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_RATE_LIMIT_COOLDOWN)
    }
}

impl BoundedExecutor {
    /// Create an executor with the given rate-limit cooldown.
    pub fn new(cooldown: Duration) -> Self {
        Self { cooldown }
    }

    /// Pause applied after a throttled chunk when no longer wait is hinted.
    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Evaluate every identifier, returning decisions in input order.
    ///
    /// `concurrency` is expected to be clamped already; zero is treated as
    /// one.
    ///
    /// # Errors
    ///
    /// The first non-rate-limit error returned by an evaluation aborts the
    /// run once its chunk has resolved.
    pub async fn run<F, Fut>(
        &self,
        identifiers: &[Identifier],
        concurrency: usize,
        evaluate: F,
    ) -> SyncResult<Vec<Decision>>
    where
        F: Fn(Identifier) -> Fut,
        Fut: Future<Output = SyncResult<Decision>>,
    {
        let concurrency = concurrency.max(1);
        let chunk_count = identifiers.len().div_ceil(concurrency);
        let mut decisions = Vec::with_capacity(identifiers.len());

        for (chunk_index, chunk) in identifiers.chunks(concurrency).enumerate() {
            let results = join_all(chunk.iter().cloned().map(&evaluate)).await;

            let mut throttled = false;
            let mut hint: Option<Duration> = None;

            for (identifier, result) in chunk.iter().zip(results) {
                let decision = match result {
                    Ok(decision) => decision,
                    Err(e) if e.is_rate_limited() => {
                        hint = hint.max(e.retry_after());
                        Decision::error(identifier.clone(), FailureKind::RateLimited, e.to_string())
                    },
                    Err(e) => {
                        error!(identifier = %identifier, chunk = chunk_index, error = %e, "Chunk failed, aborting run");
                        return Err(e);
                    },
                };

                throttled |= matches!(
                    decision.outcome,
                    Outcome::Error { kind: FailureKind::RateLimited, .. }
                );
                decisions.push(decision);
            }

            debug!(chunk = chunk_index, size = chunk.len(), "Chunk resolved");

            let is_last = chunk_index + 1 == chunk_count;
            if throttled && !is_last {
                let pause = hint.map_or(self.cooldown, |hint| hint.max(self.cooldown));
                warn!(chunk = chunk_index, pause_ms = pause.as_millis() as u64, "Rate limited, cooling down");
                tokio::time::sleep(pause).await;
            }
        }

        Ok(decisions)
    }
}

// =============================================================================
// Tests
// =============================================================================
