//! Daemon configuration.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use zeroize::Zeroizing;

use restock_exec::{
    BatchOptions, ReconcilerConfig, DEFAULT_CONCURRENCY, DEFAULT_MAX_RETRIES, DEFAULT_PAGE_SIZE,
    DEFAULT_RATE_LIMIT_COOLDOWN, DEFAULT_RETRY_DELAY,
};

use crate::error::{DaemonError, DaemonResult};

// =============================================================================
// Configuration
// =============================================================================

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Run defaults
    pub sync: SyncConfig,

    /// ERP connection (required outside the test environment)
    pub source: Option<SourceConfig>,

    /// Marketplace connection (required outside the test environment)
    pub sink: Option<SinkConfig>,

    /// Environment (test, development, production)
    pub environment: Environment,
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
}

/// Defaults applied to every run unless a request overrides them.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub concurrency: usize,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub rate_limit_cooldown: Duration,
    pub page_size: usize,
}

/// ERP connection settings.
#[derive(Clone)]
pub struct SourceConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: Zeroizing<String>,
}

/// Marketplace connection settings.
#[derive(Clone)]
pub struct SinkConfig {
    pub base_url: String,
    pub seller_id: String,
    pub client_id: String,
    pub client_secret: Zeroizing<String>,
    pub refresh_token: Zeroizing<String>,
}

/// Environment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Test environment (uses stubs)
    Test,
    /// Development environment
    Development,
    /// Production environment
    Production,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> DaemonResult<Self> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        let environment = Self::load_environment()?;
        let api = Self::load_api_config()?;
        let sync = Self::load_sync_config()?;

        let (source, sink) = if environment == Environment::Test {
            (None, None)
        } else {
            (Some(Self::load_source_config()?), Some(Self::load_sink_config()?))
        };

        Ok(Self { api, sync, source, sink, environment })
    }

    /// Create test configuration.
    pub fn test() -> Self {
        Self {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
            },
            sync: SyncConfig::default(),
            source: None,
            sink: None,
            environment: Environment::Test,
        }
    }

    fn load_environment() -> DaemonResult<Environment> {
        let env_str = env::var("RESTOCK_ENV").unwrap_or_else(|_| "development".to_string());

        match env_str.to_lowercase().as_str() {
            "test" => Ok(Environment::Test),
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(DaemonError::Config(format!(
                "Invalid RESTOCK_ENV: {}. Expected: test, development, production",
                other
            ))),
        }
    }

    fn load_api_config() -> DaemonResult<ApiConfig> {
        let host = env::var("RESTOCK_API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = Self::load_parsed_env("RESTOCK_API_PORT", 8080u16)?;

        Ok(ApiConfig { host, port })
    }

    fn load_sync_config() -> DaemonResult<SyncConfig> {
        let concurrency = Self::load_parsed_env("RESTOCK_CONCURRENCY", DEFAULT_CONCURRENCY)?;
        if concurrency == 0 {
            return Err(DaemonError::Config("RESTOCK_CONCURRENCY must be at least 1".to_string()));
        }

        let page_size = Self::load_parsed_env("RESTOCK_PAGE_SIZE", DEFAULT_PAGE_SIZE)?;
        if page_size == 0 {
            return Err(DaemonError::Config("RESTOCK_PAGE_SIZE must be at least 1".to_string()));
        }

        Ok(SyncConfig {
            concurrency,
            max_retries: Self::load_parsed_env("RESTOCK_MAX_RETRIES", DEFAULT_MAX_RETRIES)?,
            retry_delay: Duration::from_millis(Self::load_parsed_env(
                "RESTOCK_RETRY_DELAY_MS",
                DEFAULT_RETRY_DELAY.as_millis() as u64,
            )?),
            rate_limit_cooldown: Duration::from_millis(Self::load_parsed_env(
                "RESTOCK_RATE_LIMIT_COOLDOWN_MS",
                DEFAULT_RATE_LIMIT_COOLDOWN.as_millis() as u64,
            )?),
            page_size,
        })
    }

    fn load_source_config() -> DaemonResult<SourceConfig> {
        Ok(SourceConfig {
            base_url: Self::required_env("RESTOCK_SOURCE_BASE_URL")?,
            client_id: Self::required_env("RESTOCK_SOURCE_CLIENT_ID")?,
            client_secret: Zeroizing::new(Self::required_env("RESTOCK_SOURCE_CLIENT_SECRET")?),
        })
    }

    fn load_sink_config() -> DaemonResult<SinkConfig> {
        Ok(SinkConfig {
            base_url: Self::required_env("RESTOCK_SINK_BASE_URL")?,
            seller_id: Self::required_env("RESTOCK_SINK_SELLER_ID")?,
            client_id: Self::required_env("RESTOCK_SINK_CLIENT_ID")?,
            client_secret: Zeroizing::new(Self::required_env("RESTOCK_SINK_CLIENT_SECRET")?),
            refresh_token: Zeroizing::new(Self::required_env("RESTOCK_SINK_REFRESH_TOKEN")?),
        })
    }

    fn required_env(key: &str) -> DaemonResult<String> {
        match env::var(key) {
            Ok(val) if !val.trim().is_empty() => Ok(val),
            _ => Err(DaemonError::Config(format!("Missing required {}", key))),
        }
    }

    fn load_parsed_env<T: FromStr>(key: &str, default: T) -> DaemonResult<T> {
        match env::var(key) {
            Ok(val) => val
                .trim()
                .parse()
                .map_err(|_| DaemonError::Config(format!("Invalid {} value: {}", key, val))),
            Err(_) => Ok(default),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig { host: "0.0.0.0".to_string(), port: 8080 },
            sync: SyncConfig::default(),
            source: None,
            sink: None,
            environment: Environment::Development,
        }
    }
}

impl SyncConfig {
    /// Batch options used when a request does not override them.
    pub fn batch_defaults(&self) -> BatchOptions {
        BatchOptions {
            concurrency: self.concurrency,
            max_retries: self.max_retries,
            retry_delay: self.retry_delay,
            ..BatchOptions::default()
        }
    }

    /// Static reconciler settings.
    pub fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            page_size: self.page_size,
            rate_limit_cooldown: self.rate_limit_cooldown,
            ..ReconcilerConfig::default()
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            rate_limit_cooldown: DEFAULT_RATE_LIMIT_COOLDOWN,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

impl fmt::Debug for SinkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkConfig")
            .field("base_url", &self.base_url)
            .field("seller_id", &self.seller_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Test => write!(f, "test"),
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
