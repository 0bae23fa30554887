//! Tally Core - budget status pipeline
//!
//! This crate provides the core logic for the Tally budget service,
//! including:
//! - Budgets: budget model and stores (memory, SQLite)
//! - Stats: remote spend figures behind a circuit breaker
//! - Cache: cache-aside spend snapshots (memory, Redis)
//! - Status: spend-vs-limit health classification
//! - Quota: per-plan rolling quota for chart generation
//! - Identity: bearer token payload decoding and quota keys
//! - Chart: QuickChart URLs for category breakdowns

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod budget;
pub mod cache;
pub mod chart;
pub mod clock;
pub mod error;
pub mod identity;
pub mod quota;
pub mod stats;
pub mod status;
pub mod utils;

pub use budget::{Budget, BudgetId, BudgetStore, MemoryBudgetStore, NewBudget, SqliteBudgetStore};
pub use cache::{
    CacheError, CacheLookup, CacheStore, MemoryCacheStore, RedisCacheStore, SpendCache,
    SpendSnapshot,
};
pub use chart::chart_url;
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use error::{Error, Result};
pub use identity::{decode_bearer, resolve_quota_key, IdentityContext};
pub use quota::{Plan, QuotaDecision, QuotaLedger};
pub use stats::{
    ExternalStatsGateway, GatewayConfig, GatewayError, GroupStats, HttpStatsProvider,
    MockStatsProvider, StatsFallback, StatsProvider,
};
pub use status::{classify, BudgetStatus, Health, StatusResolver};
pub use utils::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
