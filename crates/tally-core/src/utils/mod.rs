//! Utility modules for tally-core
//!
//! Provides common utilities:
//! - circuit_breaker: Circuit breaker pattern for fault tolerance

mod circuit_breaker;

pub use circuit_breaker::{CallPermit, CircuitBreaker, CircuitBreakerConfig, CircuitState};
