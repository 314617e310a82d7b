//! Quota Circuit Breaker
//!
//! Remembers that a candidate ran out of quota so later requests skip it
//! instead of burning retries against a known 429.
//!
//! ## States
//!
//! - **Closed**: normal operation, requests flow through
//! - **Open**: quota exhausted, requests skipped until the cooldown ends
//! - **HalfOpen**: cooldown elapsed, a single trial request is admitted
//!
//! ## Transitions
//!
//! ```text
//! Closed   --[rate limited]-----> Open(until)
//! Open     --[until elapsed]----> HalfOpen
//! HalfOpen --[success]----------> Closed
//! HalfOpen --[rate limited]-----> Open(until)
//! HalfOpen --[other failure]----> HalfOpen (trial slot released)
//! ```
//!
//! Callers pass `now` explicitly so the breaker follows the client's clock.

use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::constants::circuit_breaker as cb_constants;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
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

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Cooldown used when the provider gave no retry hint
    pub default_cooldown: Duration,
    /// Maximum trial requests allowed in half-open state
    pub half_open_max_requests: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            default_cooldown: Duration::from_secs(cb_constants::DEFAULT_COOLDOWN_SECS),
            half_open_max_requests: cb_constants::HALF_OPEN_MAX_REQUESTS,
        }
    }
}

#[derive(Debug)]
struct CircuitBreakerInner {
    state: CircuitState,
    open_until: Option<Instant>,
    half_open_requests: u32,
    trip_count: u64,
    blocked_count: u64,
}

impl CircuitBreakerInner {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            open_until: None,
            half_open_requests: 0,
            trip_count: 0,
            blocked_count: 0,
        }
    }

    fn close(&mut self) {
        self.state = CircuitState::Closed;
        self.open_until = None;
        self.half_open_requests = 0;
    }

    /// Open -> HalfOpen once the cooldown has elapsed
    fn refresh(&mut self, now: Instant, name: &str) {
        if self.state == CircuitState::Open && self.open_until.is_some_and(|until| now >= until) {
            self.state = CircuitState::HalfOpen;
            self.half_open_requests = 0;
            tracing::info!("Circuit breaker [{}]: cooldown elapsed, HALF_OPEN", name);
        }
    }
}

/// Thread-safe quota breaker for one candidate.
///
/// All state sits behind a single RwLock so the state and its deadline change together.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    name: String,
    inner: RwLock<CircuitBreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            name: name.into(),
            inner: RwLock::new(CircuitBreakerInner::new()),
        }
    }

    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, CircuitBreakerConfig::default())
    }

    /// Current state at `now`
    pub fn state(&self, now: Instant) -> CircuitState {
        let mut inner = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        inner.refresh(now, &self.name);
        inner.state
    }

    /// Check whether a request may proceed, consuming a trial slot when half-open
    pub fn allow_request(&self, now: Instant) -> bool {
        let mut inner = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        inner.refresh(now, &self.name);

        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                inner.blocked_count += 1;
                tracing::debug!("Circuit breaker [{}]: request skipped (OPEN)", self.name);
                false
            }
            CircuitState::HalfOpen => {
                if inner.half_open_requests < self.config.half_open_max_requests {
                    inner.half_open_requests += 1;
                    tracing::debug!("Circuit breaker [{}]: admitting trial request", self.name);
                    true
                } else {
                    inner.blocked_count += 1;
                    false
                }
            }
        }
    }

    /// Time left until the breaker admits a trial call, if it is open
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        let inner = self
            .inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match (inner.state, inner.open_until) {
            (CircuitState::Open, Some(until)) if until > now => Some(until - now),
            _ => None,
        }
    }

    /// Record a successful call
    pub fn record_success(&self) {
        let mut inner = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if inner.state != CircuitState::Closed {
            tracing::info!("Circuit breaker [{}]: CLOSED (quota recovered)", self.name);
        }
        inner.close();
    }

    /// Open the breaker after a quota failure, for `retry_after` or the default cooldown
    pub fn trip(&self, now: Instant, retry_after: Option<Duration>) {
        let mut inner = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let cooldown = retry_after
            .unwrap_or(self.config.default_cooldown)
            .min(Duration::from_secs(cb_constants::MAX_COOLDOWN_SECS));
        inner.state = CircuitState::Open;
        inner.open_until = Some(now.checked_add(cooldown).unwrap_or(now));
        inner.half_open_requests = 0;
        inner.trip_count += 1;

        tracing::warn!(
            "Circuit breaker [{}]: OPEN for {:.1}s after quota exhaustion",
            self.name,
            cooldown.as_secs_f64()
        );
    }

    /// A non-quota failure says nothing about quota; free the trial slot
    pub fn release_trial(&self) {
        let mut inner = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if inner.state == CircuitState::HalfOpen {
            inner.half_open_requests = inner.half_open_requests.saturating_sub(1);
        }
    }

    /// Get statistics for monitoring
    pub fn stats(&self, now: Instant) -> CircuitBreakerStats {
        let state = self.state(now);
        let inner = self
            .inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        CircuitBreakerStats {
            name: self.name.clone(),
            state,
            trip_count: inner.trip_count,
            blocked_count: inner.blocked_count,
            remaining: match (state, inner.open_until) {
                (CircuitState::Open, Some(until)) if until > now => Some(until - now),
                _ => None,
            },
        }
    }

    /// Force reset to closed state
    pub fn reset(&self) {
        let mut inner = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        inner.close();
        tracing::info!("Circuit breaker [{}]: manually reset to CLOSED", self.name);
    }
}

/// Statistics for monitoring circuit breaker state
#[derive(Debug, Clone)]
pub struct CircuitBreakerStats {
    pub name: String,
    pub state: CircuitState,
    pub trip_count: u64,
    pub blocked_count: u64,
    pub remaining: Option<Duration>,
}

impl CircuitBreakerStats {
    /// Format as human-readable summary
    pub fn summary(&self) -> String {
        let remaining = self
            .remaining
            .map(|d| format!(" for {:.1}s", d.as_secs_f64()))
            .unwrap_or_default();

        format!(
            "[{}] {}{} | trips={} skipped={}",
            self.name, self.state, remaining, self.trip_count, self.blocked_count
        )
    }
}
