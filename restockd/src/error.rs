//! Daemon error types.

use restock_domain::DomainError;
use restock_exec::SyncError;
use thiserror::Error;

/// Daemon-level errors.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Domain error
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Reconciliation error
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// API server error
    #[error("Server error: {0}")]
    Server(String),
}

/// Result type for daemon operations.
pub type DaemonResult<T> = Result<T, DaemonError>;
