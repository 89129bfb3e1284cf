//! Configuration management for the Trade Ledger server
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with TL_ prefix

use std::time::Duration;

use config::{ConfigError, Environment, File};
use serde::Deserialize;

use crate::store::{LockConfig, ShortfallPolicy, StoreSettings};

/// Main application configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database holding documents, pools and item history
    pub database: DatabaseConfig,

    /// Ledger locking and sale policy
    pub ledger: LedgerConfig,

    /// Outbound notification webhook
    pub notification: NotificationConfig,

    /// Log output format
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL; documents stay in memory when unset
    pub url: Option<String>,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LedgerConfig {
    /// Wait on a single key before an acquisition attempt is abandoned
    pub lock_timeout_ms: u64,

    /// Acquisition attempts before a request fails with contention
    pub max_lock_attempts: u32,

    /// Base backoff between attempts, doubled each retry
    pub retry_base_delay_ms: u64,

    /// Handling of sale quantity not covered by sold-billed stock
    pub shortfall_policy: ShortfallPolicy,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotificationConfig {
    /// Webhook receiving document notifications; disabled when unset
    pub webhook_url: Option<String>,

    /// Request timeout in milliseconds
    pub timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// Emit JSON log lines instead of the human-readable format
    pub json: bool,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("TL_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("ledger.lock_timeout_ms", 2000)?
            .set_default("ledger.max_lock_attempts", 3)?
            .set_default("ledger.retry_base_delay_ms", 50)?
            .set_default("ledger.shortfall_policy", "restore_virtual")?
            .set_default("notification.timeout_ms", 5000)?
            .set_default("logging.json", false)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (TL_ prefix)
            .add_source(
                Environment::with_prefix("TL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Store settings derived from the ledger section
    pub fn store_settings(&self) -> StoreSettings {
        StoreSettings {
            locks: self.ledger.lock_config(),
            shortfall_policy: self.ledger.shortfall_policy,
        }
    }
}

impl LedgerConfig {
    pub fn lock_config(&self) -> LockConfig {
        LockConfig {
            lock_timeout: Duration::from_millis(self.lock_timeout_ms),
            max_attempts: self.max_lock_attempts.max(1),
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            ..LockConfig::default()
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            min_connections: 2,
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 2000,
            max_lock_attempts: 3,
            retry_base_delay_ms: 50,
            shortfall_policy: ShortfallPolicy::default(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_ms: 5000,
        }
    }
}
