//! HTTP API for the restock daemon.
//!
//! Provides REST endpoints for:
//! - Health check
//! - Sync one identifier
//! - Sync a batch of identifiers
//! - Sync the whole marketplace catalog
//!
//! `/sync/all` is matched before `/sync/:identifier`, so an ERP code
//! literally named `all` cannot be synced through the single-item route;
//! use `POST /sync` with a one-element batch instead.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use restock_domain::{Decision, DomainError, Identifier, RunResult};
use restock_engine::SyncOptions;
use restock_exec::{BatchOptions, Reconciler, SinkPort, SourcePort, SyncError};

use crate::error::DaemonError;

// =============================================================================
// API State
// =============================================================================

/// Shared state for API handlers.
pub struct ApiState<S: SourcePort + 'static, K: SinkPort + 'static> {
    pub reconciler: Arc<Reconciler<S, K>>,
    /// Batch options used when a request leaves a field out
    pub defaults: BatchOptions,
}

// =============================================================================
// Request/Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Per-request overrides of the configured batch defaults.
#[derive(Debug, Default, Deserialize)]
pub struct BatchOverrides {
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub force_update: bool,
    pub concurrency: Option<usize>,
    pub max_retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
}

impl BatchOverrides {
    /// Resolve against the configured defaults.
    pub fn apply(&self, defaults: BatchOptions) -> BatchOptions {
        BatchOptions {
            sync: SyncOptions { dry_run: self.dry_run, force_update: self.force_update },
            concurrency: self.concurrency.unwrap_or(defaults.concurrency),
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            retry_delay: self.retry_delay_ms.map(Duration::from_millis).unwrap_or(defaults.retry_delay),
        }
    }
}

/// Request to sync a batch of identifiers.
#[derive(Debug, Deserialize)]
pub struct SyncManyRequest {
    pub identifiers: Vec<String>,
    #[serde(flatten)]
    pub overrides: BatchOverrides,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

// =============================================================================
// Router
// =============================================================================

/// Create the API router.
pub fn create_router<S, K>(state: Arc<ApiState<S, K>>) -> Router
where
    S: SourcePort + 'static,
    K: SinkPort + 'static,
{
    Router::new()
        .route("/health", get(health_handler))
        .route("/sync", post(sync_many_handler))
        .route("/sync/all", post(sync_all_handler))
        .route("/sync/:identifier", post(sync_one_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint.
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Sync a single identifier. The body is optional.
async fn sync_one_handler<S, K>(
    State(state): State<Arc<ApiState<S, K>>>,
    Path(identifier): Path<String>,
    options: Option<Json<SyncOptions>>,
) -> Result<Json<Decision>, ApiError>
where
    S: SourcePort + 'static,
    K: SinkPort + 'static,
{
    let identifier = Identifier::new(&identifier).map_err(|e| to_error_response(e.into()))?;
    let options = options.map(|Json(options)| options).unwrap_or_default();

    let decision = state
        .reconciler
        .sync_one(&identifier, options, None)
        .await
        .map_err(|e| to_error_response(e.into()))?;

    Ok(Json(decision))
}

/// Sync a batch of identifiers.
async fn sync_many_handler<S, K>(
    State(state): State<Arc<ApiState<S, K>>>,
    Json(request): Json<SyncManyRequest>,
) -> Result<Json<RunResult>, ApiError>
where
    S: SourcePort + 'static,
    K: SinkPort + 'static,
{
    let identifiers = request
        .identifiers
        .iter()
        .map(Identifier::new)
        .collect::<Result<Vec<_>, DomainError>>()
        .map_err(|e| to_error_response(e.into()))?;
    let options = request.overrides.apply(state.defaults);

    let result = state
        .reconciler
        .sync_many(identifiers, options)
        .await
        .map_err(|e| to_error_response(e.into()))?;

    Ok(Json(result))
}

/// Sync every linkable listing in the marketplace catalog. The body is optional.
async fn sync_all_handler<S, K>(
    State(state): State<Arc<ApiState<S, K>>>,
    overrides: Option<Json<BatchOverrides>>,
) -> Result<Json<RunResult>, ApiError>
where
    S: SourcePort + 'static,
    K: SinkPort + 'static,
{
    let options = overrides
        .map(|Json(overrides)| overrides.apply(state.defaults))
        .unwrap_or(state.defaults);

    let result = state
        .reconciler
        .sync_all(options)
        .await
        .map_err(|e| to_error_response(e.into()))?;

    Ok(Json(result))
}

// =============================================================================
// Helpers
// =============================================================================

fn to_error_response(error: DaemonError) -> ApiError {
    let status = match &error {
        DaemonError::Domain(_) => StatusCode::BAD_REQUEST,
        DaemonError::Sync(e) if e.is_validation() => StatusCode::BAD_REQUEST,
        DaemonError::Sync(SyncError::Config(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        DaemonError::Sync(_) => StatusCode::BAD_GATEWAY,
        DaemonError::Config(_) | DaemonError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (status, Json(ErrorResponse { error: error.to_string() }))
}

// =============================================================================
// Tests
// =============================================================================
