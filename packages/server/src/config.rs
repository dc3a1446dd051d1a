use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    pub allow_origins: Vec<String>,
    pub max_age: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origins: vec![],
            max_age: 3600,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub cors: CorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

/// Bounds applied to every aggregation transaction.
#[derive(Debug, Deserialize, Clone)]
pub struct AggregationConfig {
    /// Longest wait for a transaction to start and, on PostgreSQL, for each row lock.
    pub max_wait_ms: u64,
    /// Longest time the transaction body, commit included, may run.
    pub timeout_ms: u64,
}

impl AggregationConfig {
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            max_wait_ms: 10_000,
            timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AdmissionConfig {
    /// Value of the `Retry-After` header sent with a 429.
    pub retry_after_secs: u64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self { retry_after_secs: 1 }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub aggregation: AggregationConfig,
    #[serde(default)]
    pub admission: AdmissionConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("database.max_connections", 100)?
            .set_default("database.min_connections", 5)?
            .set_default("database.connect_timeout_secs", 8)?
            .set_default("database.idle_timeout_secs", 300)?
            .set_default("aggregation.max_wait_ms", 10_000)?
            .set_default("aggregation.timeout_ms", 10_000)?
            .set_default("admission.retry_after_secs", 1)?
            // Load from config/config.toml
            .add_source(File::with_name("config/config").required(false))
            // Override from environment (e.g., AGGREGATOR__DATABASE__URL)
            .add_source(Environment::with_prefix("AGGREGATOR").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
