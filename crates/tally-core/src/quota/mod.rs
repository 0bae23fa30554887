//! Chart quota accounting
//!
//! Per-identity, plan-scoped call quota on a rolling window. Counters live in
//! process memory only; a restart forgets them.

use crate::clock::{system_clock, SharedClock};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Length of one quota window, in days
pub const QUOTA_WINDOW_DAYS: i64 = 30;

/// Subscription plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Plan {
    /// Free tier
    #[default]
    Free,
    /// Paid tier
    Pro,
    /// Organisation tier
    Enterprise,
}

impl Plan {
    /// Chart calls allowed per window
    #[must_use]
    pub const fn limit(self) -> u32 {
        match self {
            Self::Free => 2,
            Self::Pro => 15,
            Self::Enterprise => 50,
        }
    }

    /// Parse a plan name, case-insensitively. Anything unrecognised is `Free`.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PRO" => Self::Pro,
            "ENTERPRISE" => Self::Enterprise,
            _ => Self::Free,
        }
    }

    /// Upper-case plan name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "FREE",
            Self::Pro => "PRO",
            Self::Enterprise => "ENTERPRISE",
        }
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a quota check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaDecision {
    /// Whether the call may proceed
    pub allowed: bool,
    /// Calls left in the current window
    pub remaining: u32,
    /// When the current window ends
    pub reset_at: DateTime<Utc>,
    /// The plan's limit
    pub limit: u32,
}

#[derive(Debug, Clone, Copy)]
struct QuotaCounter {
    count: u32,
    reset_at: DateTime<Utc>,
}

/// In-process rolling quota ledger
///
/// State per key:
/// - absent or past `reset_at`: a fresh window starts with `count = 1`
/// - `count < limit`: increment and allow
/// - `count >= limit`: deny, `reset_at` unchanged
pub struct QuotaLedger {
    counters: DashMap<String, QuotaCounter>,
    window: chrono::Duration,
    clock: SharedClock,
}

impl Default for QuotaLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl QuotaLedger {
    /// Create a ledger with the 30-day window
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    /// Create a ledger driven by the given clock
    #[must_use]
    pub fn with_clock(clock: SharedClock) -> Self {
        Self {
            counters: DashMap::new(),
            window: chrono::Duration::days(QUOTA_WINDOW_DAYS),
            clock,
        }
    }

    /// Record one call for `key` under `plan`
    pub fn consume(&self, key: &str, plan: Plan) -> QuotaDecision {
        let now = self.clock.now();
        let limit = plan.limit();

        let mut entry = self
            .counters
            .entry(key.to_string())
            .or_insert(QuotaCounter {
                count: 0,
                reset_at: now,
            });
        let counter = entry.value_mut();

        if counter.count == 0 || now >= counter.reset_at {
            *counter = QuotaCounter {
                count: 1,
                reset_at: now + self.window,
            };
            debug!(key = %key, plan = %plan, "Quota window started");
            return QuotaDecision {
                allowed: true,
                remaining: limit.saturating_sub(1),
                reset_at: counter.reset_at,
                limit,
            };
        }

        if counter.count >= limit {
            debug!(key = %key, plan = %plan, count = counter.count, "Quota exhausted");
            return QuotaDecision {
                allowed: false,
                remaining: 0,
                reset_at: counter.reset_at,
                limit,
            };
        }

        counter.count += 1;
        QuotaDecision {
            allowed: true,
            remaining: limit - counter.count,
            reset_at: counter.reset_at,
            limit,
        }
    }

    /// Report what `consume` would decide, without recording a call
    #[must_use]
    pub fn peek(&self, key: &str, plan: Plan) -> QuotaDecision {
        let now = self.clock.now();
        let limit = plan.limit();

        match self.counters.get(key).map(|c| *c.value()) {
            Some(counter) if now < counter.reset_at => QuotaDecision {
                allowed: counter.count < limit,
                remaining: limit.saturating_sub(counter.count),
                reset_at: counter.reset_at,
                limit,
            },
            _ => QuotaDecision {
                allowed: limit > 0,
                remaining: limit,
                reset_at: now + self.window,
                limit,
            },
        }
    }

    /// Drop counters whose window has ended; returns how many were dropped
    pub fn compact(&self) -> usize {
        let now = self.clock.now();
        let before = self.counters.len();
        self.counters.retain(|_, counter| now < counter.reset_at);
        let dropped = before.saturating_sub(self.counters.len());
        if dropped > 0 {
            info!(dropped, remaining = self.counters.len(), "Compacted quota counters");
        }
        dropped
    }

    /// Number of tracked keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// Whether no keys are tracked
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

#[cfg(test)]
mod tests;
