//! Cache - cache-aside layer in front of the stats gateway
//!
//! - `store`: key-value backends (in-memory)
//! - `redis_store`: Redis backend
//! - `spend`: the spend cache itself
//!
//! Cache backends may be entirely unreachable; the spend cache treats that
//! as a visible branch ([`CacheLookup::Unavailable`]) and falls through to
//! the gateway.

mod redis_store;
mod spend;
mod store;

pub use redis_store::RedisCacheStore;
pub use spend::{CacheLookup, SpendCache, SpendSnapshot, DEFAULT_SPEND_TTL};
pub use store::{CacheStore, MemoryCacheStore};

use thiserror::Error;

/// Cache backend failure
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    /// The backend could not be reached
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),

    /// The backend rejected a command
    #[error("cache command failed: {0}")]
    Command(String),
}
