//! Circuit Breaker pattern implementation
//!
//! Provides fault tolerance by preventing cascading failures.
//! The circuit breaker has three states:
//! - Closed: Normal operation, requests pass through
//! - Open: Error rate crossed the threshold, requests are rejected
//! - HalfOpen: Cooldown elapsed, a single trial request is admitted
//!
//! The error rate is computed over a rolling time window of recent call
//! outcomes. All timing goes through an injected [`Clock`].

use crate::clock::{system_clock, SharedClock};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Normal operation - requests pass through
    Closed,
    /// Error rate exceeded threshold - requests are rejected
    Open,
    /// Testing recovery - one trial request passes through
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "CLOSED"),
            Self::Open => write!(f, "OPEN"),
            Self::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Configuration for circuit breaker
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Error rate (percent of calls in the rolling window) above which the circuit opens
    pub error_threshold_percentage: f64,
    /// Window over which call outcomes are counted
    pub rolling_window: Duration,
    /// Calls required in the window before the error rate is evaluated
    pub minimum_calls: u32,
    /// Duration to wait before transitioning from open to half-open
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            error_threshold_percentage: 50.0,
            rolling_window: Duration::from_secs(10),
            minimum_calls: 0,
            reset_timeout: Duration::from_secs(10),
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a new configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set error threshold percentage
    #[must_use]
    pub fn with_error_threshold_percentage(mut self, percentage: f64) -> Self {
        self.error_threshold_percentage = percentage;
        self
    }

    /// Set rolling window
    #[must_use]
    pub fn with_rolling_window(mut self, window: Duration) -> Self {
        self.rolling_window = window;
        self
    }

    /// Set minimum call volume
    #[must_use]
    pub fn with_minimum_calls(mut self, calls: u32) -> Self {
        self.minimum_calls = calls;
        self
    }

    /// Set reset timeout
    #[must_use]
    pub fn with_reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout = timeout;
        self
    }
}

#[derive(Debug, Clone, Copy)]
struct Outcome {
    at: DateTime<Utc>,
    failed: bool,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    outcomes: VecDeque<Outcome>,
    opened_at: Option<DateTime<Utc>>,
    trial_in_flight: bool,
}

/// Circuit breaker for fault tolerance
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    clock: SharedClock,
    inner: Mutex<BreakerInner>,
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}

impl CircuitBreaker {
    /// Create a new circuit breaker on the system clock
    #[must_use]
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self::with_clock(name, config, system_clock())
    }

    /// Create a new circuit breaker on the given clock
    #[must_use]
    pub fn with_clock(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        clock: SharedClock,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            clock,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                outcomes: VecDeque::new(),
                opened_at: None,
                trial_in_flight: false,
            }),
        }
    }

    /// Create with default configuration
    #[must_use]
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, CircuitBreakerConfig::default())
    }

    /// Get the circuit breaker name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Get the current state, applying the cooldown transition if due
    #[must_use]
    pub fn state(&self) -> CircuitState {
        let mut inner = self.lock();
        self.check_state_transition(&mut inner);
        inner.state
    }

    /// Error rate over the rolling window, in percent
    #[must_use]
    pub fn error_rate(&self) -> f64 {
        let mut inner = self.lock();
        self.prune(&mut inner);
        rate_of(&inner.outcomes)
    }

    /// Ask to run a call through the breaker.
    ///
    /// Returns `None` when the call must short-circuit. The returned permit
    /// must be resolved with [`CallPermit::success`] or [`CallPermit::failure`];
    /// dropping it unresolved gives up a half-open trial slot without
    /// counting an outcome.
    #[must_use]
    pub fn try_acquire(&self) -> Option<CallPermit<'_>> {
        let mut inner = self.lock();
        self.check_state_transition(&mut inner);

        match inner.state {
            CircuitState::Closed => Some(CallPermit::new(self, false)),
            CircuitState::Open => None,
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    debug!(name = %self.name, "Trial call already in flight, short-circuiting");
                    None
                } else {
                    inner.trial_in_flight = true;
                    debug!(name = %self.name, "Admitting half-open trial call");
                    Some(CallPermit::new(self, true))
                }
            }
        }
    }

    /// Reset the circuit breaker to closed state
    pub fn reset(&self) {
        let mut inner = self.lock();
        self.close(&mut inner);
    }

    fn record_success(&self, trial: bool) {
        let now = self.clock.now();
        let mut inner = self.lock();

        match inner.state {
            CircuitState::HalfOpen if trial => {
                self.close(&mut inner);
            }
            CircuitState::Closed => {
                inner.outcomes.push_back(Outcome { at: now, failed: false });
                self.prune(&mut inner);
            }
            // Late result from a call admitted before the circuit opened
            _ => {}
        }
    }

    /// Returns whether the circuit is open after recording
    fn record_failure(&self, trial: bool) -> bool {
        let now = self.clock.now();
        let mut inner = self.lock();

        match inner.state {
            CircuitState::Closed => {
                inner.outcomes.push_back(Outcome { at: now, failed: true });
                self.prune(&mut inner);

                let calls = inner.outcomes.len();
                let rate = rate_of(&inner.outcomes);
                debug!(
                    name = %self.name,
                    calls = calls,
                    error_rate = rate,
                    threshold = self.config.error_threshold_percentage,
                    "Circuit breaker failure recorded"
                );

                if calls >= self.config.minimum_calls as usize
                    && rate > self.config.error_threshold_percentage
                {
                    self.open(&mut inner, now);
                }
            }
            CircuitState::HalfOpen if trial => {
                warn!(
                    name = %self.name,
                    "Circuit breaker trial call failed, reopening"
                );
                self.open(&mut inner, now);
            }
            _ => {}
        }

        inner.state == CircuitState::Open
    }

    fn release_trial(&self) {
        let mut inner = self.lock();
        if inner.state == CircuitState::HalfOpen {
            inner.trial_in_flight = false;
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Check and perform the Open -> HalfOpen transition
    fn check_state_transition(&self, inner: &mut BreakerInner) {
        if inner.state != CircuitState::Open {
            return;
        }
        let Some(opened_at) = inner.opened_at else {
            return;
        };

        let elapsed = self.clock.now() - opened_at;
        if elapsed >= to_chrono(self.config.reset_timeout) {
            info!(name = %self.name, "Circuit breaker entering half-open state");
            inner.state = CircuitState::HalfOpen;
            inner.trial_in_flight = false;
        }
    }

    fn prune(&self, inner: &mut BreakerInner) {
        let cutoff = self.clock.now() - to_chrono(self.config.rolling_window);
        while inner.outcomes.front().is_some_and(|o| o.at <= cutoff) {
            inner.outcomes.pop_front();
        }
    }

    fn open(&self, inner: &mut BreakerInner, now: DateTime<Utc>) {
        if inner.state != CircuitState::Open {
            info!(
                name = %self.name,
                error_rate = rate_of(&inner.outcomes),
                "Circuit breaker opened"
            );
        }
        inner.state = CircuitState::Open;
        inner.opened_at = Some(now);
        inner.trial_in_flight = false;
    }

    fn close(&self, inner: &mut BreakerInner) {
        if inner.state != CircuitState::Closed {
            info!(name = %self.name, "Circuit breaker closed");
        }
        inner.state = CircuitState::Closed;
        inner.outcomes.clear();
        inner.opened_at = None;
        inner.trial_in_flight = false;
    }
}

/// Admission ticket for one call through a [`CircuitBreaker`]
#[must_use = "a permit must be resolved with success() or failure()"]
pub struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    resolved: bool,
}

impl<'a> CallPermit<'a> {
    fn new(breaker: &'a CircuitBreaker, trial: bool) -> Self {
        Self {
            breaker,
            trial,
            resolved: false,
        }
    }

    /// Whether this permit is the half-open trial call
    #[must_use]
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    /// Record a successful call
    pub fn success(mut self) {
        self.resolved = true;
        self.breaker.record_success(self.trial);
    }

    /// Record a failed call; returns whether the circuit is now open
    pub fn failure(mut self) -> bool {
        self.resolved = true;
        self.breaker.record_failure(self.trial)
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if !self.resolved && self.trial {
            self.breaker.release_trial();
        }
    }
}

fn rate_of(outcomes: &VecDeque<Outcome>) -> f64 {
    if outcomes.is_empty() {
        return 0.0;
    }
    let failures = outcomes.iter().filter(|o| o.failed).count();
    failures as f64 / outcomes.len() as f64 * 100.0
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}
