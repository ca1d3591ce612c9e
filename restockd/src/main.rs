//! Restock Daemon
//!
//! Serves the reconciliation API over the configured ERP and marketplace.
//!
//! # Usage
//!
//! ```bash
//! # Start against in-memory remote systems
//! RESTOCK_ENV=test cargo run -p restockd
//!
//! # Start against the real systems
//! RESTOCK_ENV=production RESTOCK_SOURCE_BASE_URL=... cargo run -p restockd
//! ```
//!
//! # Environment Variables
//!
//! - `RESTOCK_ENV`: Environment (test, development, production)
//! - `RESTOCK_API_HOST`: API host (default: 0.0.0.0)
//! - `RESTOCK_API_PORT`: API port (default: 8080)
//! - `RESTOCK_CONCURRENCY`: Items in flight per chunk (default: 10)
//! - `RESTOCK_MAX_RETRIES`: Retry passes (default: 3)
//! - `RESTOCK_RETRY_DELAY_MS`: Wait before each retry (default: 5000)
//! - `RESTOCK_RATE_LIMIT_COOLDOWN_MS`: Pause after a throttled chunk (default: 2000)
//! - `RESTOCK_PAGE_SIZE`: Listings per catalog page (default: 50)
//! - `RESTOCK_SOURCE_BASE_URL`, `RESTOCK_SOURCE_CLIENT_ID`, `RESTOCK_SOURCE_CLIENT_SECRET`
//! - `RESTOCK_SINK_BASE_URL`, `RESTOCK_SINK_SELLER_ID`, `RESTOCK_SINK_CLIENT_ID`,
//!   `RESTOCK_SINK_CLIENT_SECRET`, `RESTOCK_SINK_REFRESH_TOKEN`

use restockd::{Config, Daemon, Environment};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::from_default_env()
                .add_directive("restockd=info".parse()?)
                .add_directive("restock_exec=info".parse()?),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        api_host = %config.api.host,
        api_port = config.api.port,
        concurrency = config.sync.concurrency,
        "Restock Daemon"
    );

    // Create and run daemon
    match config.environment {
        Environment::Test => Daemon::new_stub(config).run().await?,
        Environment::Development | Environment::Production => Daemon::new_rest(config)?.run().await?,
    }

    Ok(())
}
