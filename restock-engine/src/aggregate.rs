//! Run aggregation.
//!
//! [`RunStats`] is the running tally the retry controller adjusts between
//! passes. [`aggregate`] takes that settled tally as the report's counters
//! and attaches the final decisions to the [`RunResult`] returned to the
//! caller.

use chrono::{DateTime, Utc};
use restock_domain::{Decision, Outcome, RunId, RunResult, UnlinkableListing};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-outcome counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub updated: usize,
    pub no_change: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl RunStats {
    /// Tally a sequence of decisions.
    pub fn from_decisions<'a>(decisions: impl IntoIterator<Item = &'a Decision>) -> Self {
        let mut stats = Self::default();
        for decision in decisions {
            stats.record(&decision.outcome);
        }
        stats
    }

    /// Count one outcome.
    pub fn record(&mut self, outcome: &Outcome) {
        *self.bucket(outcome) += 1;
    }

    /// Move one item from the bucket of `previous` to the bucket of `current`.
    ///
    /// Only an Error → non-error flip changes the tally; an item that keeps
    /// failing stays counted once as an error.
    pub fn reclassify(&mut self, previous: &Outcome, current: &Outcome) -> bool {
        if !previous.is_error() || current.is_error() {
            return false;
        }
        let from = self.bucket(previous);
        *from = from.saturating_sub(1);
        *self.bucket(current) += 1;
        true
    }

    /// Sum of all counters.
    pub fn total(&self) -> usize {
        self.updated + self.no_change + self.skipped + self.errors
    }

    fn bucket(&mut self, outcome: &Outcome) -> &mut usize {
        match outcome {
            Outcome::Updated | Outcome::WouldUpdate => &mut self.updated,
            Outcome::NoChange => &mut self.no_change,
            Outcome::Skipped { .. } => &mut self.skipped,
            Outcome::Error { .. } => &mut self.errors,
        }
    }
}

/// Context of a run that the decisions alone do not carry.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub retry_attempts: u32,
    pub warnings: Vec<String>,
    pub unlinkable: Vec<UnlinkableListing>,
}

/// Build the run report from the settled tally and the final decisions.
/// Never fails.
///
/// `stats` must describe `items`; debug builds check it against a fresh fold.
pub fn aggregate(items: Vec<Decision>, stats: RunStats, context: RunContext) -> RunResult {
    debug_assert_eq!(stats, RunStats::from_decisions(&items), "run tally drifted from decisions");

    RunResult {
        run_id: context.run_id,
        total_requested: items.len(),
        updated: stats.updated,
        no_change: stats.no_change,
        skipped: stats.skipped,
        errors: stats.errors,
        items,
        elapsed: context.elapsed,
        started_at: context.started_at,
        finished_at: context.finished_at,
        retry_attempts: context.retry_attempts,
        warnings: context.warnings,
        unlinkable: context.unlinkable,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use restock_domain::{FailureKind, Identifier, SkipReason};
    use uuid::Uuid;

    fn decision(code: &str, outcome: Outcome) -> Decision {
        Decision::new(Identifier::new(code).unwrap(), outcome)
    }

    fn context() -> RunContext {
        let now = Utc::now();
        RunContext {
            run_id: Uuid::now_v7(),
            started_at: now,
            finished_at: now,
            elapsed: Duration::from_millis(1500),
            retry_attempts: 1,
            warnings: vec!["capped".to_string()],
            unlinkable: Vec::new(),
        }
    }

    fn aggregate_folded(items: Vec<Decision>) -> RunResult {
        let stats = RunStats::from_decisions(&items);
        aggregate(items, stats, context())
    }

    #[test]
    fn test_aggregate_buckets() {
        let items = vec![
            decision("A", Outcome::Updated),
            decision("B", Outcome::WouldUpdate),
            decision("C", Outcome::NoChange),
            decision("D", Outcome::Skipped { reason: SkipReason::NotInSink }),
            decision("E", Outcome::Error { kind: FailureKind::Terminal, message: "400".into() }),
        ];

        let result = aggregate_folded(items);

        assert_eq!(result.total_requested, 5);
        assert_eq!(result.updated, 2);
        assert_eq!(result.no_change, 1);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.errors, 1);
        assert_eq!(result.items[0].identifier.as_str(), "A");
        assert_eq!(result.retry_attempts, 1);
        assert_eq!(result.warnings, vec!["capped".to_string()]);
    }

    #[test]
    fn test_aggregate_all_failed_still_reports() {
        let items: Vec<Decision> = (0..3)
            .map(|i| {
                decision(
                    &format!("X{}", i),
                    Outcome::Error { kind: FailureKind::ServerUnavailable, message: "503".into() },
                )
            })
            .collect();

        let result = aggregate_folded(items);
        assert_eq!(result.errors, 3);
        assert_eq!(result.total_requested, 3);
        assert!(!result.is_clean());
    }

    #[test]
    fn test_aggregate_empty() {
        let result = aggregate_folded(Vec::new());
        assert_eq!(result.total_requested, 0);
        assert!(result.is_clean());
    }

    #[test]
    fn test_aggregate_uses_settled_tally_after_retry() {
        let error = Outcome::Error { kind: FailureKind::RateLimited, message: "429".into() };
        let mut items = vec![decision("A", Outcome::Updated), decision("B", error.clone())];
        let mut stats = RunStats::from_decisions(&items);

        // Retry pass recovers B
        assert!(stats.reclassify(&error, &Outcome::Updated));
        items[1] = decision("B", Outcome::Updated);

        let result = aggregate(items, stats, context());
        assert_eq!(result.updated, 2);
        assert_eq!(result.errors, 0);
        assert!(result.is_clean());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "run tally drifted")]
    fn test_aggregate_rejects_stale_tally() {
        let items = vec![decision("A", Outcome::Updated)];
        let stale = RunStats { errors: 1, ..Default::default() };

        aggregate(items, stale, context());
    }

    #[test]
    fn test_reclassify_only_on_error_flip() {
        let error = Outcome::Error { kind: FailureKind::RateLimited, message: "429".into() };
        let mut stats = RunStats { errors: 2, updated: 1, ..Default::default() };

        assert!(!stats.reclassify(&error, &error));
        assert_eq!(stats.errors, 2);

        assert!(stats.reclassify(&error, &Outcome::Updated));
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.updated, 2);

        assert!(!stats.reclassify(&Outcome::NoChange, &Outcome::Updated));
        assert_eq!(stats.total(), 3);
    }

    #[test]
    fn test_reclassify_matches_fold() {
        let error = Outcome::Error { kind: FailureKind::RateLimited, message: "429".into() };
        let mut items = vec![
            decision("A", Outcome::Updated),
            decision("B", error.clone()),
            decision("C", error.clone()),
        ];
        let mut stats = RunStats::from_decisions(&items);

        let retried = decision("B", Outcome::NoChange);
        stats.reclassify(&items[1].outcome, &retried.outcome);
        items[1] = retried;

        assert_eq!(stats, RunStats::from_decisions(&items));
        assert_eq!(stats.total(), items.len());
    }
}
