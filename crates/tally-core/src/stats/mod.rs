//! Stats - remote "total spent" figures per group
//!
//! - `provider`: raw providers (HTTP, mock)
//! - `gateway`: timeout + circuit breaker + fallback around a provider

mod gateway;
mod provider;

pub use gateway::{ExternalStatsGateway, GatewayConfig, StatsFallback};
pub use provider::{HttpStatsProvider, MockStatsProvider, StatsProvider};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Spending statistics for one group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupStats {
    /// Total amount spent
    pub total_spent: f64,
    /// Amount spent per category
    #[serde(default)]
    pub by_category: BTreeMap<String, f64>,
}

/// Failure of a single stats call
///
/// Every variant counts the same toward the breaker's error rate.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GatewayError {
    /// The call took longer than the configured timeout
    #[error("stats provider timed out after {0} ms")]
    Timeout(u64),

    /// The provider answered with something other than 200
    #[error("stats provider responded with status {0}")]
    NonSuccessStatus(u16),

    /// Connection-level failure
    #[error("stats provider unreachable: {0}")]
    Network(String),

    /// A 200 response whose body could not be read
    #[error("invalid stats payload: {0}")]
    Decode(String),
}
