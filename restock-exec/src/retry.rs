//! Retry controller.
//!
//! Re-runs the executor over the items whose first-pass decision is a
//! retryable error, at reduced concurrency, until none remain or the
//! attempt budget is spent. Retried decisions replace the originals in
//! place, so the result keeps the caller's order.

use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use restock_domain::{Decision, Identifier};
use restock_engine::{retry_concurrency, RunStats};

use crate::error::SyncResult;
use crate::executor::BoundedExecutor;

/// Default number of retry attempts.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default wait before each retry attempt.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// How failed items are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the initial pass
    pub max_retries: u32,
    /// Wait before each attempt
    pub delay: Duration,
    /// Concurrency used by every attempt
    pub concurrency: usize,
}

impl RetryPolicy {
    /// Policy for a run whose first pass used `effective_concurrency`.
    pub fn new(max_retries: u32, delay: Duration, effective_concurrency: usize) -> Self {
        Self { max_retries, delay, concurrency: retry_concurrency(effective_concurrency) }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY, 1)
    }
}

/// Drives retry passes over a decision set.
pub struct RetryController<'a> {
    policy: RetryPolicy,
    executor: &'a BoundedExecutor,
}

impl<'a> RetryController<'a> {
    pub fn new(policy: RetryPolicy, executor: &'a BoundedExecutor) -> Self {
        Self { policy, executor }
    }

    /// Retry every retryable error in `decisions` until settled.
    ///
    /// `stats` is adjusted as items flip from error to a non-error outcome.
    /// Returns the number of attempts made.
    ///
    /// # Errors
    ///
    /// Propagates a run-aborting error from the executor.
    pub async fn settle<F, Fut>(
        &self,
        decisions: &mut [Decision],
        stats: &mut RunStats,
        evaluate: F,
    ) -> SyncResult<u32>
    where
        F: Fn(Identifier) -> Fut,
        Fut: Future<Output = SyncResult<Decision>>,
    {
        let mut attempts = 0;

        while attempts < self.policy.max_retries {
            let pending: Vec<usize> = decisions
                .iter()
                .enumerate()
                .filter(|(_, decision)| decision.outcome.is_retryable_error())
                .map(|(position, _)| position)
                .collect();

            if pending.is_empty() {
                break;
            }

            attempts += 1;
            info!(
                attempt = attempts,
                max_retries = self.policy.max_retries,
                items = pending.len(),
                concurrency = self.policy.concurrency,
                delay_ms = self.policy.delay.as_millis() as u64,
                "Retrying failed items"
            );
            tokio::time::sleep(self.policy.delay).await;

            let identifiers: Vec<Identifier> =
                pending.iter().map(|&position| decisions[position].identifier.clone()).collect();
            let retried = self.executor.run(&identifiers, self.policy.concurrency, &evaluate).await?;

            let mut recovered = 0;
            for (position, decision) in pending.into_iter().zip(retried) {
                if stats.reclassify(&decisions[position].outcome, &decision.outcome) {
                    recovered += 1;
                }
                decisions[position] = decision;
            }
            info!(attempt = attempts, recovered, errors = stats.errors, "Retry attempt finished");
        }

        let remaining = decisions.iter().filter(|d| d.outcome.is_retryable_error()).count();
        if remaining > 0 {
            warn!(remaining, attempts, "Items still failing after retries");
        }

        Ok(attempts)
    }
}

// =============================================================================
// Tests
// =============================================================================
