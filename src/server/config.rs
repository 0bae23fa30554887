//! Server configuration types
//!
//! Contains all configuration structures for the Tally server.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tally_core::{CircuitBreakerConfig, GatewayConfig};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub stats: StatsConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub charts: ChartsConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Only origin allowed by CORS in production
    #[serde(default)]
    pub cors_origin: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
            cors_origin: None,
        }
    }
}

/// Budget store backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Sqlite,
}

/// Budget store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// SQLite database file
    #[serde(default = "default_store_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> String {
    "data/tally.db".to_string()
}

/// Redis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    /// Use Redis for the spend cache; in-process cache otherwise
    #[serde(default)]
    pub enabled: bool,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            enabled: false,
        }
    }
}

/// Remote stats provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    /// Base URL of the expenses service; empty means mock statistics
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_error_threshold")]
    pub error_threshold_percentage: f64,
    #[serde(default = "default_rolling_window_ms")]
    pub rolling_window_ms: u64,
    #[serde(default)]
    pub minimum_calls: u32,
    #[serde(default = "default_reset_timeout_ms")]
    pub reset_timeout_ms: u64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout_ms: default_timeout_ms(),
            error_threshold_percentage: default_error_threshold(),
            rolling_window_ms: default_rolling_window_ms(),
            minimum_calls: 0,
            reset_timeout_ms: default_reset_timeout_ms(),
        }
    }
}

impl StatsConfig {
    /// Whether a real provider is configured
    pub fn uses_mock(&self) -> bool {
        self.base_url.trim().is_empty()
    }

    /// Gateway settings derived from this section
    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            timeout: Duration::from_millis(self.timeout_ms),
            breaker: CircuitBreakerConfig::new()
                .with_error_threshold_percentage(self.error_threshold_percentage)
                .with_rolling_window(Duration::from_millis(self.rolling_window_ms))
                .with_minimum_calls(self.minimum_calls)
                .with_reset_timeout(Duration::from_millis(self.reset_timeout_ms)),
        }
    }
}

fn default_timeout_ms() -> u64 {
    3000
}
fn default_error_threshold() -> f64 {
    50.0
}
fn default_rolling_window_ms() -> u64 {
    10_000
}
fn default_reset_timeout_ms() -> u64 {
    10_000
}

/// Spend cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
        }
    }
}

fn default_ttl_secs() -> u64 {
    60
}

/// Chart feature configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// How often expired quota counters are dropped
    #[serde(default = "default_quota_sweep_secs")]
    pub quota_sweep_secs: u64,
}

impl Default for ChartsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            quota_sweep_secs: default_quota_sweep_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_quota_sweep_secs() -> u64 {
    3600
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::loader::DEFAULT_CONFIG;
    use config::{Config, File, FileFormat};

    fn parse(extra: &str) -> AppConfig {
        Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .add_source(File::from_str(extra, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_embedded_defaults() {
        let config = parse("");
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert!(!config.redis.enabled);
        assert!(config.stats.uses_mock());
        assert_eq!(config.cache.ttl_secs, 60);
        assert!(config.charts.enabled);
    }

    #[test]
    fn test_gateway_config_from_stats_section() {
        let config = parse(
            r#"
            [stats]
            base_url = "http://expenses:3000/api/v1/internal"
            timeout_ms = 1500
            minimum_calls = 4
            reset_timeout_ms = 2000
            "#,
        );
        assert!(!config.stats.uses_mock());

        let gateway = config.stats.gateway_config();
        assert_eq!(gateway.timeout, Duration::from_millis(1500));
        assert_eq!(gateway.breaker.minimum_calls, 4);
        assert_eq!(gateway.breaker.reset_timeout, Duration::from_secs(2));
        assert_eq!(gateway.breaker.error_threshold_percentage, 50.0);
        assert_eq!(gateway.breaker.rolling_window, Duration::from_secs(10));
    }

    #[test]
    fn test_sqlite_backend_parses() {
        let config = parse("[store]\nbackend = \"sqlite\"\npath = \"/tmp/t.db\"");
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(config.store.path, "/tmp/t.db");
    }
}
