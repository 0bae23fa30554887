//! Spend cache
//!
//! Cache-aside over a [`CacheStore`], keyed `spend:{group_id}`. Never fails:
//! cache outages fall through to the gateway and missing data collapses to
//! zero spend.

use super::CacheStore;
use crate::clock::{system_clock, SharedClock};
use crate::stats::{ExternalStatsGateway, GroupStats};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default snapshot lifetime
pub const DEFAULT_SPEND_TTL: Duration = Duration::from_secs(60);

/// Cached spend figures for one group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendSnapshot {
    /// Group the figures belong to
    pub group_id: String,
    /// Total amount spent
    pub total_spent: f64,
    /// Amount spent per category
    #[serde(default)]
    pub by_category: BTreeMap<String, f64>,
    /// When the figures were fetched from the gateway
    pub fetched_at: DateTime<Utc>,
}

impl SpendSnapshot {
    /// Build a snapshot from gateway output; no data means zero spend
    #[must_use]
    pub fn from_stats(group_id: &str, stats: Option<GroupStats>, fetched_at: DateTime<Utc>) -> Self {
        let stats = stats.unwrap_or(GroupStats {
            total_spent: 0.0,
            by_category: BTreeMap::new(),
        });
        Self {
            group_id: group_id.to_string(),
            total_spent: stats.total_spent,
            by_category: stats.by_category,
            fetched_at,
        }
    }

    /// Whether the snapshot is still within `ttl` at `now`
    #[must_use]
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        chrono::Duration::from_std(ttl)
            .map(|ttl| now < self.fetched_at + ttl)
            .unwrap_or(true)
    }
}

/// Outcome of reading the cache
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    /// A fresh snapshot was found
    Hit(SpendSnapshot),
    /// Nothing usable cached
    Miss,
    /// The cache backend could not be reached
    Unavailable,
}

/// Cache-aside spend lookup in front of the stats gateway
pub struct SpendCache {
    store: Arc<dyn CacheStore>,
    gateway: Arc<ExternalStatsGateway>,
    ttl: Duration,
    clock: SharedClock,
}

impl SpendCache {
    /// Create a spend cache with the default TTL
    #[must_use]
    pub fn new(store: Arc<dyn CacheStore>, gateway: Arc<ExternalStatsGateway>) -> Self {
        Self {
            store,
            gateway,
            ttl: DEFAULT_SPEND_TTL,
            clock: system_clock(),
        }
    }

    /// Set the snapshot lifetime
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the clock used to stamp and age snapshots
    #[must_use]
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Cache key for a group
    #[must_use]
    pub fn key(group_id: &str) -> String {
        format!("spend:{}", group_id)
    }

    /// The gateway behind this cache
    #[must_use]
    pub fn gateway(&self) -> &ExternalStatsGateway {
        &self.gateway
    }

    /// Name of the cache backend
    #[must_use]
    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Read the cache only
    pub async fn lookup(&self, group_id: &str) -> CacheLookup {
        let key = Self::key(group_id);

        match self.store.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_str::<SpendSnapshot>(&raw) {
                Ok(snapshot) if snapshot.is_fresh(self.clock.now(), self.ttl) => {
                    CacheLookup::Hit(snapshot)
                }
                Ok(_) => CacheLookup::Miss,
                Err(e) => {
                    warn!(key = %key, error = %e, "Discarding unreadable spend snapshot");
                    CacheLookup::Miss
                }
            },
            Ok(None) => CacheLookup::Miss,
            Err(e) => {
                warn!(key = %key, error = %e, "Spend cache unavailable, bypassing");
                CacheLookup::Unavailable
            }
        }
    }

    /// Spend snapshot for a group, from cache or the gateway
    pub async fn get_snapshot(&self, group_id: &str) -> SpendSnapshot {
        let cache_reachable = match self.lookup(group_id).await {
            CacheLookup::Hit(snapshot) => {
                debug!(group_id = %group_id, "Spend cache hit");
                return snapshot;
            }
            CacheLookup::Miss => true,
            CacheLookup::Unavailable => false,
        };

        let stats = match self.gateway.fetch_stats(group_id).await {
            Ok(stats) => stats,
            Err(e) => {
                warn!(group_id = %group_id, error = %e, "Stats unavailable, treating spend as zero");
                None
            }
        };
        let snapshot = SpendSnapshot::from_stats(group_id, stats, self.clock.now());

        if cache_reachable {
            self.write_back(&snapshot).await;
        }
        snapshot
    }

    /// Total spent for a group; never fails
    pub async fn get_total_spent(&self, group_id: &str) -> f64 {
        self.get_snapshot(group_id).await.total_spent
    }

    async fn write_back(&self, snapshot: &SpendSnapshot) {
        let key = Self::key(&snapshot.group_id);
        let json = match serde_json::to_string(snapshot) {
            Ok(json) => json,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to serialize spend snapshot");
                return;
            }
        };

        match self.store.set(&key, &json, self.ttl).await {
            Ok(()) => debug!(key = %key, ttl_secs = self.ttl.as_secs(), "Spend snapshot cached"),
            Err(e) => warn!(key = %key, error = %e, "Failed to cache spend snapshot"),
        }
    }
}
