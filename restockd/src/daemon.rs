//! Daemon: wires the reconciler to its remote systems and serves the API.
//!
//! # Lifecycle
//!
//! 1. Load configuration
//! 2. Build connectors and credential caches
//! 3. Start API server
//! 4. Wait for SIGINT, then stop

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};

use restock_connectors::{ErpRestClient, ErpTokenIssuer, MarketplaceRestClient, MarketplaceTokenIssuer};
use restock_domain::{ClientCredentials, RemoteSystem};
use restock_exec::{CachedCredential, Reconciler, SinkPort, SourcePort, StubIssuer, StubSink, StubSource};

use crate::api::{create_router, ApiState};
use crate::config::Config;
use crate::error::{DaemonError, DaemonResult};

// =============================================================================
// Daemon
// =============================================================================

/// The restock daemon.
pub struct Daemon<S: SourcePort + 'static, K: SinkPort + 'static> {
    /// Configuration
    config: Config,
    /// Shared reconciler
    reconciler: Arc<Reconciler<S, K>>,
}

impl Daemon<StubSource, StubSink> {
    /// Create a new daemon with in-memory remote systems (for testing/development).
    pub fn new_stub(config: Config) -> Self {
        let reconciler = Reconciler::new(
            Arc::new(StubSource::new()),
            Arc::new(StubSink::new()),
            Arc::new(CachedCredential::new(StubIssuer::hourly(RemoteSystem::Source))),
            Arc::new(CachedCredential::new(StubIssuer::hourly(RemoteSystem::Sink))),
            config.sync.reconciler_config(),
        );

        Self::new(config, Arc::new(reconciler))
    }
}

impl Daemon<ErpRestClient, MarketplaceRestClient> {
    /// Create a daemon talking to the configured ERP and marketplace.
    pub fn new_rest(config: Config) -> DaemonResult<Self> {
        let source = config
            .source
            .as_ref()
            .ok_or_else(|| DaemonError::Config("ERP connection is not configured".to_string()))?;
        let sink = config
            .sink
            .as_ref()
            .ok_or_else(|| DaemonError::Config("Marketplace connection is not configured".to_string()))?;

        let erp_issuer = ErpTokenIssuer::new(
            &source.base_url,
            ClientCredentials::new(source.client_id.as_str(), source.client_secret.as_str()),
        )?;
        let marketplace_issuer = MarketplaceTokenIssuer::new(
            &sink.base_url,
            ClientCredentials::new(sink.client_id.as_str(), sink.client_secret.as_str()),
            sink.refresh_token.as_str(),
        )?;

        let reconciler = Reconciler::new(
            Arc::new(ErpRestClient::new(&source.base_url)?),
            Arc::new(MarketplaceRestClient::new(&sink.base_url, sink.seller_id.as_str())?),
            Arc::new(CachedCredential::new(erp_issuer)),
            Arc::new(CachedCredential::new(marketplace_issuer)),
            config.sync.reconciler_config(),
        );

        Ok(Self::new(config, Arc::new(reconciler)))
    }
}

impl<S: SourcePort + 'static, K: SinkPort + 'static> Daemon<S, K> {
    /// Create a new daemon with a provided reconciler.
    pub fn new(config: Config, reconciler: Arc<Reconciler<S, K>>) -> Self {
        Self { config, reconciler }
    }

    /// Shared reconciler.
    pub fn reconciler(&self) -> Arc<Reconciler<S, K>> {
        self.reconciler.clone()
    }

    /// Run the daemon.
    ///
    /// This method blocks until shutdown is requested (SIGINT).
    pub async fn run(self) -> DaemonResult<()> {
        info!(
            version = env!("CARGO_PKG_VERSION"),
            environment = %self.config.environment,
            "Starting restock daemon"
        );

        let api_addr = self.start_api_server().await?;
        info!(%api_addr, "API server started");

        tokio::signal::ctrl_c()
            .await
            .map_err(|e| DaemonError::Server(format!("Failed to listen for shutdown signal: {}", e)))?;

        info!("Received shutdown signal");
        Ok(())
    }

    /// Start the API server.
    async fn start_api_server(&self) -> DaemonResult<SocketAddr> {
        let state = Arc::new(ApiState {
            reconciler: self.reconciler.clone(),
            defaults: self.config.sync.batch_defaults(),
        });

        let router = create_router(state);
        let addr = format!("{}:{}", self.config.api.host, self.config.api.port);

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| DaemonError::Server(format!("Failed to bind to {}: {}", addr, e)))?;

        let local_addr = listener
            .local_addr()
            .map_err(|e| DaemonError::Server(format!("Failed to get local address: {}", e)))?;

        // Spawn the server task
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                error!(error = %e, "API server error");
            }
        });

        Ok(local_addr)
    }
}

// =============================================================================
// Tests
// =============================================================================
