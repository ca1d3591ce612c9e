//! Execution layer error types.
//!
//! Remote failures are classified where they are observed (the port
//! adapters), so nothing downstream has to guess from message text.

use std::time::Duration;

use restock_domain::{DomainError, FailureKind, RemoteSystem};
use thiserror::Error;

/// Errors that can occur during reconciliation.
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    /// Remote system reports the entity does not exist (404)
    #[error("Not found in {system}: {what}")]
    NotFound { system: RemoteSystem, what: String },

    /// Remote system throttled the call (429)
    #[error("Rate limited by {system}: {message}")]
    RateLimited {
        system: RemoteSystem,
        message: String,
        /// Wait suggested by the remote system, if any
        retry_after: Option<Duration>,
    },

    /// Remote system answered 5xx or could not be reached
    #[error("{system} unavailable: {message}")]
    ServerUnavailable { system: RemoteSystem, message: String },

    /// Token rejected (401); the credential is refreshed before the retry
    #[error("Unauthorized by {system}: {message}")]
    Unauthorized { system: RemoteSystem, message: String },

    /// Request refused (other 4xx); retrying cannot help
    #[error("Rejected by {system}: {message}")]
    Rejected { system: RemoteSystem, message: String },

    /// Unclassified remote failure (bad payload, timeout, transport)
    #[error("Remote error from {system}: {message}")]
    Remote { system: RemoteSystem, message: String },

    /// Caller supplied an invalid batch
    #[error("Validation error: {0}")]
    Validation(String),

    /// Domain error
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Create a rate-limited error.
    pub fn rate_limited(
        system: RemoteSystem,
        message: impl Into<String>,
        retry_after: Option<Duration>,
    ) -> Self {
        Self::RateLimited { system, message: message.into(), retry_after }
    }

    /// Create a server-unavailable error.
    pub fn unavailable(system: RemoteSystem, message: impl Into<String>) -> Self {
        Self::ServerUnavailable { system, message: message.into() }
    }

    /// Create an unclassified remote error.
    pub fn remote(system: RemoteSystem, message: impl Into<String>) -> Self {
        Self::Remote { system, message: message.into() }
    }

    /// Create a not-found error.
    pub fn not_found(system: RemoteSystem, what: impl Into<String>) -> Self {
        Self::NotFound { system, what: what.into() }
    }

    /// Classification recorded on failed decisions.
    pub fn kind(&self) -> FailureKind {
        match self {
            SyncError::RateLimited { .. } => FailureKind::RateLimited,
            SyncError::ServerUnavailable { .. } => FailureKind::ServerUnavailable,
            SyncError::Unauthorized { .. } | SyncError::Remote { .. } => FailureKind::Transient,
            SyncError::NotFound { .. }
            | SyncError::Rejected { .. }
            | SyncError::Validation(_)
            | SyncError::Domain(_)
            | SyncError::Config(_) => FailureKind::Terminal,
        }
    }

    /// Check if this is a throttling signal
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, SyncError::RateLimited { .. })
    }

    /// Check if the remote entity does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::NotFound { .. })
    }

    /// Check if the credential was rejected
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, SyncError::Unauthorized { .. })
    }

    /// Wait hint carried by a rate-limit error.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            SyncError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Check if the caller is at fault (maps to HTTP 400 at the API layer)
    pub fn is_validation(&self) -> bool {
        matches!(self, SyncError::Validation(_) | SyncError::Domain(_))
    }
}

/// Result type for execution operations.
pub type SyncResult<T> = Result<T, SyncError>;

// =============================================================================
// Tests
// =============================================================================
