//! Concurrency limits for batch runs.

/// Absolute ceiling on items in flight.
pub const MAX_CONCURRENCY: usize = 50;

/// Above this the run is allowed but flagged.
pub const SOFT_CONCURRENCY_LIMIT: usize = 20;

/// Floor for the retry pass concurrency.
pub const MIN_RETRY_CONCURRENCY: usize = 2;

/// Effective concurrency after clamping a requested value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcurrencyPlan {
    pub requested: usize,
    pub effective: usize,
    /// Set when the request exceeded the soft limit or was capped
    pub warning: Option<String>,
}

/// Clamp a requested concurrency to the ceiling.
///
/// Values above [`MAX_CONCURRENCY`] are capped, never rejected. Zero is
/// raised to one; callers that treat zero as invalid check it first.
pub fn clamp_concurrency(requested: usize) -> ConcurrencyPlan {
    let effective = requested.clamp(1, MAX_CONCURRENCY);

    let warning = if requested > MAX_CONCURRENCY {
        Some(format!(
            "Requested concurrency {} exceeds the maximum of {}; capped to {}",
            requested, MAX_CONCURRENCY, effective
        ))
    } else if requested > SOFT_CONCURRENCY_LIMIT {
        Some(format!(
            "Concurrency {} is above the recommended limit of {}; expect throttling",
            requested, SOFT_CONCURRENCY_LIMIT
        ))
    } else {
        None
    };

    ConcurrencyPlan { requested, effective, warning }
}

/// Concurrency for retry passes: half the initial value, at least 2.
///
/// Computed once from the initial effective value and reused for every
/// attempt.
pub fn retry_concurrency(effective: usize) -> usize {
    (effective / 2).max(MIN_RETRY_CONCURRENCY)
}

// =============================================================================
// Tests
// =============================================================================
