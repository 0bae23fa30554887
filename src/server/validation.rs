//! Production configuration validation
//!
//! Checks for risky settings in production deployments.

use super::config::{AppConfig, StoreBackend};
use super::loader::is_production;
use anyhow::{bail, Result};
use tracing::warn;

/// Validate configuration; hard errors for unusable values, warnings for
/// risky production settings
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if !(0.0..=100.0).contains(&config.stats.error_threshold_percentage) {
        bail!(
            "stats.error_threshold_percentage must be within 0..=100, got {}",
            config.stats.error_threshold_percentage
        );
    }
    if config.stats.timeout_ms == 0 {
        bail!("stats.timeout_ms must be greater than zero");
    }
    if config.cache.ttl_secs == 0 {
        bail!("cache.ttl_secs must be greater than zero");
    }

    if !is_production() {
        return Ok(());
    }

    if config.server.host == "0.0.0.0" && config.server.cors_origin.is_none() {
        warn!(
            "SECURITY WARNING: Server is exposed on all interfaces with no CORS origin configured. \
             Set [server] cors_origin in production."
        );
    }

    if config.stats.uses_mock() {
        warn!(
            "Stats provider is not configured in production. \
             Budget status will be computed from mock statistics."
        );
    }

    if config.store.backend == StoreBackend::Memory {
        warn!("Budget store is in-memory in production. Budgets are lost on restart.");
    }

    if config.redis.enabled && config.redis.url.starts_with("redis://") && !config.redis.url.contains('@')
    {
        warn!(
            "SECURITY WARNING: Redis connection appears to have no authentication in production. \
             Consider enabling Redis AUTH."
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let mut config = AppConfig::default();
        config.stats.error_threshold_percentage = 150.0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let mut config = AppConfig::default();
        config.cache.ttl_secs = 0;
        assert!(validate_config(&config).is_err());
    }
}
