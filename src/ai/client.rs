//! Resilient Generation Client
//!
//! Tries an ordered list of (provider, model) candidates for one prompt.
//!
//! ## Strategy
//!
//! 1. Skip a candidate whose quota breaker is open (counts as rate limited)
//! 2. Call the candidate under its own timeout
//! 3. Classified failure: retry on the same candidate while the kind's
//!    attempt budget allows, sleeping for the provider hint or exponential backoff
//! 4. Budget spent or non-retryable kind: fall back to the next candidate
//! 5. First success wins; structured shapes go through extraction and repair
//!
//! Provider failures never surface as `Err`; callers get a [`GenerationOutcome`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use rand::Rng;
use tracing::{debug, info, instrument, warn};

use crate::ai::clock::{Clock, TokioClock};
use crate::ai::outcome::{
    AttemptRecord, Exhaustion, GenerationOutcome, GenerationRequest, GenerationSuccess, Payload,
    UnparseableOutput,
};
use crate::ai::provider::{
    AttemptResult, Candidate, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats,
    SharedAdapter,
};
use crate::ai::timeout::attempt_with_timeout;
use crate::ai::validation::extract_structured;
use crate::constants::backoff as backoff_constants;
use crate::types::{ErrorKind, ProviderFailure};

// =============================================================================
// Backoff
// =============================================================================

/// Delay policy between attempts on the same candidate
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max_delay: Duration,
    /// Exclusive upper bound of the uniform jitter; zero disables jitter
    pub max_jitter: Duration,
    /// Provider hints longer than this are clamped
    pub retry_after_cap: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(backoff_constants::BASE_DELAY_MS),
            max_delay: Duration::from_millis(backoff_constants::MAX_DELAY_MS),
            max_jitter: Duration::from_millis(backoff_constants::MAX_JITTER_MS),
            retry_after_cap: Duration::from_secs(backoff_constants::RETRY_AFTER_CAP_SECS),
        }
    }
}

impl BackoffPolicy {
    /// Delay before the attempt following `attempt` (1-based) that failed with `failure`
    pub fn delay_for(&self, attempt: u8, failure: &ProviderFailure) -> Duration {
        match failure.retry_after_secs {
            Some(secs) => Duration::from_secs(secs).min(self.retry_after_cap),
            None => self.exponential(attempt),
        }
    }

    /// `min(2^attempt * base + jitter, max_delay)`
    pub fn exponential(&self, attempt: u8) -> Duration {
        let factor = 1u32.checked_shl(u32::from(attempt)).unwrap_or(u32::MAX);
        let delay = self
            .base
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .saturating_add(random_jitter(self.max_jitter));
        delay.min(self.max_delay)
    }
}

fn random_jitter(max_jitter: Duration) -> Duration {
    let max_jitter_ms = max_jitter.as_millis() as u64;
    if max_jitter_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(0..max_jitter_ms))
}

// =============================================================================
// Client
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub backoff: BackoffPolicy,
    pub circuit_breaker: CircuitBreakerConfig,
}

/// How one candidate ended
enum CandidateResult {
    Succeeded(String),
    Failed(ProviderFailure),
}

pub struct ResilientClient {
    adapter: SharedAdapter,
    config: ClientConfig,
    clock: Arc<dyn Clock>,
    /// Quota breakers keyed by `provider/model`
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl ResilientClient {
    pub fn new(adapter: SharedAdapter, config: ClientConfig) -> Self {
        Self {
            adapter,
            config,
            clock: Arc::new(TokioClock),
            breakers: DashMap::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Run one generation request through the candidate list
    #[instrument(skip(self, request), fields(candidates = request.candidates().len(), shape = ?request.shape()))]
    pub async fn generate(&self, request: &GenerationRequest) -> GenerationOutcome {
        let mut attempts: Vec<AttemptRecord> = Vec::new();
        let mut all_rate_limited = true;
        let mut min_retry_after: Option<u64> = None;
        let mut last_failure: Option<ProviderFailure> = None;

        for (index, candidate) in request.candidates().iter().enumerate() {
            let result = self.run_candidate(candidate, request, &mut attempts).await;

            let failure = match result {
                CandidateResult::Succeeded(raw_text) => {
                    info!(
                        candidate = %candidate,
                        attempts = attempts.len(),
                        fell_back = index > 0,
                        "Generation succeeded"
                    );
                    return self.finish(request, candidate, raw_text, attempts, index > 0);
                }
                CandidateResult::Failed(failure) => failure,
            };

            if failure.kind == ErrorKind::RateLimited {
                if let Some(secs) = failure.retry_after_secs {
                    min_retry_after = Some(min_retry_after.map_or(secs, |m| m.min(secs)));
                }
            } else {
                all_rate_limited = false;
            }

            if index + 1 < request.candidates().len() {
                info!(candidate = %candidate, kind = %failure.kind, "Falling back to next candidate");
            }
            last_failure = Some(failure);
        }

        let last = last_failure
            .unwrap_or_else(|| ProviderFailure::new(ErrorKind::Unknown, "no candidates were tried"));

        warn!(
            attempts = attempts.len(),
            last_kind = %last.kind,
            all_rate_limited,
            "All candidates exhausted"
        );

        GenerationOutcome::Exhausted(Exhaustion {
            last_error_kind: last.kind,
            last_message: last.message,
            all_rate_limited,
            retry_after_secs: min_retry_after,
            attempts,
        })
    }

    async fn run_candidate(
        &self,
        candidate: &Candidate,
        request: &GenerationRequest,
        attempts: &mut Vec<AttemptRecord>,
    ) -> CandidateResult {
        let breaker = self.breaker(candidate);

        if !breaker.allow_request(self.clock.now()) {
            let remaining = breaker.remaining(self.clock.now());
            debug!(candidate = %candidate, ?remaining, "Skipping candidate (quota breaker open)");
            attempts.push(AttemptRecord {
                provider: candidate.provider,
                model: candidate.model.clone(),
                attempt: 0,
                kind: Some(ErrorKind::RateLimited),
                duration_ms: 0,
                backoff_ms: 0,
            });
            let mut failure = ProviderFailure::new(
                ErrorKind::RateLimited,
                format!("{} skipped: quota cooldown in effect", candidate),
            );
            failure.retry_after_secs = remaining.map(ceil_secs);
            return CandidateResult::Failed(failure);
        }

        let max_retries = request.max_retries();
        let mut attempt: u8 = 0;

        loop {
            attempt = attempt.saturating_add(1);
            debug!(candidate = %candidate, attempt, max_retries, "Generation attempt");

            let started = Instant::now();
            let result = attempt_with_timeout(
                candidate.timeout,
                self.adapter.send(candidate, request.prompt()),
            )
            .await;
            let duration_ms = started.elapsed().as_millis() as u64;

            let mut failure = match result {
                AttemptResult::Success { raw_text } => {
                    breaker.record_success();
                    attempts.push(AttemptRecord {
                        provider: candidate.provider,
                        model: candidate.model.clone(),
                        attempt,
                        kind: None,
                        duration_ms,
                        backoff_ms: 0,
                    });
                    return CandidateResult::Succeeded(raw_text);
                }
                AttemptResult::Failure(failure) => failure,
            };

            warn!(
                candidate = %candidate,
                attempt,
                kind = %failure.kind,
                error = %failure.message,
                "Provider attempt failed"
            );

            let retry = attempt < failure.kind.attempt_budget(max_retries);
            let backoff = if retry {
                self.config.backoff.delay_for(attempt, &failure)
            } else {
                Duration::ZERO
            };

            attempts.push(AttemptRecord {
                provider: candidate.provider,
                model: candidate.model.clone(),
                attempt,
                kind: Some(failure.kind),
                duration_ms,
                backoff_ms: backoff.as_millis() as u64,
            });

            if !retry {
                if failure.kind == ErrorKind::RateLimited {
                    let now = self.clock.now();
                    let hint = failure
                        .retry_after_secs
                        .map(|secs| Duration::from_secs(secs).min(self.config.backoff.retry_after_cap));
                    breaker.trip(now, hint);
                    // callers are told to wait as long as this candidate stays skipped
                    failure.retry_after_secs = breaker.remaining(now).map(ceil_secs);
                } else {
                    breaker.release_trial();
                }
                return CandidateResult::Failed(failure);
            }

            debug!(delay_ms = backoff.as_millis() as u64, "Retrying after backoff");
            self.clock.sleep(backoff).await;
        }
    }

    fn finish(
        &self,
        request: &GenerationRequest,
        candidate: &Candidate,
        raw_text: String,
        attempts: Vec<AttemptRecord>,
        fell_back: bool,
    ) -> GenerationOutcome {
        let payload = match request.shape().structured() {
            None => Payload::Text(raw_text),
            Some(shape) => match extract_structured(&raw_text, shape) {
                Ok(value) => Payload::Json(value),
                Err(error) => {
                    warn!(candidate = %candidate, %error, "Model output could not be parsed");
                    return GenerationOutcome::Unparseable(UnparseableOutput {
                        error,
                        provider: candidate.provider,
                        model: candidate.model.clone(),
                        raw_text,
                        attempts,
                    });
                }
            },
        };

        GenerationOutcome::Success(GenerationSuccess {
            payload,
            provider: candidate.provider,
            model: candidate.model.clone(),
            attempts,
            fell_back,
        })
    }

    fn breaker(&self, candidate: &Candidate) -> Arc<CircuitBreaker> {
        let key = candidate.key();
        self.breakers
            .entry(key.clone())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(key, self.config.circuit_breaker.clone())))
            .value()
            .clone()
    }

    /// Snapshot of every breaker created so far
    pub fn breaker_stats(&self) -> Vec<CircuitBreakerStats> {
        let now = self.clock.now();
        let mut stats: Vec<_> = self
            .breakers
            .iter()
            .map(|entry| entry.value().stats(now))
            .collect();
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        stats
    }

    pub fn reset_breakers(&self) {
        for entry in self.breakers.iter() {
            entry.value().reset();
        }
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 { secs + 1 } else { secs }
}
