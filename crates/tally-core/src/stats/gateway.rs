//! External stats gateway
//!
//! Puts a timeout and a [`CircuitBreaker`] in front of a [`StatsProvider`].
//! While the circuit is open no network call is made and the configured
//! fallback is returned instead.

use super::{GatewayError, GroupStats, MockStatsProvider, StatsProvider};
use crate::clock::{system_clock, SharedClock};
use crate::utils::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Gateway settings
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Per-call timeout
    pub timeout: Duration,
    /// Breaker settings
    pub breaker: CircuitBreakerConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(3000),
            breaker: CircuitBreakerConfig::default(),
        }
    }
}

/// What the gateway returns when it cannot reach the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatsFallback {
    /// No data
    #[default]
    Empty,
    /// The fixed mock statistics
    Mock,
}

impl StatsFallback {
    fn value(self) -> Option<GroupStats> {
        match self {
            Self::Empty => None,
            Self::Mock => Some(MockStatsProvider::stats()),
        }
    }
}

/// Breaker-protected access to the remote stats provider
pub struct ExternalStatsGateway {
    provider: Arc<dyn StatsProvider>,
    breaker: CircuitBreaker,
    timeout: Duration,
    fallback: StatsFallback,
}

impl ExternalStatsGateway {
    /// Create a gateway on the system clock with an empty fallback
    #[must_use]
    pub fn new(provider: Arc<dyn StatsProvider>, config: GatewayConfig) -> Self {
        Self::with_clock(provider, config, system_clock())
    }

    /// Create a gateway on the given clock
    #[must_use]
    pub fn with_clock(
        provider: Arc<dyn StatsProvider>,
        config: GatewayConfig,
        clock: SharedClock,
    ) -> Self {
        Self {
            provider,
            breaker: CircuitBreaker::with_clock("stats-provider", config.breaker, clock),
            timeout: config.timeout,
            fallback: StatsFallback::Empty,
        }
    }

    /// Gateway for local runs: mock provider, mock fallback
    #[must_use]
    pub fn mock() -> Self {
        Self::new(Arc::new(MockStatsProvider), GatewayConfig::default())
            .with_fallback(StatsFallback::Mock)
    }

    /// Set the fallback
    #[must_use]
    pub fn with_fallback(mut self, fallback: StatsFallback) -> Self {
        self.fallback = fallback;
        self
    }

    /// The breaker guarding the provider
    #[must_use]
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Current breaker state
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.breaker.state()
    }

    /// Fetch stats for a group.
    ///
    /// Returns the fallback (`Ok`) when the circuit is open, including when
    /// this call's own failure is what opened it. A failure that leaves the
    /// circuit closed is returned as `Err`.
    pub async fn fetch_stats(&self, group_id: &str) -> Result<Option<GroupStats>, GatewayError> {
        let Some(permit) = self.breaker.try_acquire() else {
            debug!(group_id = %group_id, "Stats circuit open, serving fallback");
            return Ok(self.fallback.value());
        };

        let result = match tokio::time::timeout(self.timeout, self.provider.fetch(group_id)).await
        {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout(self.timeout.as_millis() as u64)),
        };

        match result {
            Ok(stats) => {
                permit.success();
                Ok(Some(stats))
            }
            Err(err) => {
                if permit.failure() {
                    warn!(
                        group_id = %group_id,
                        error = %err,
                        "Stats provider unavailable, serving fallback"
                    );
                    Ok(self.fallback.value())
                } else {
                    debug!(group_id = %group_id, error = %err, "Stats call failed");
                    Err(err)
                }
            }
        }
    }
}
