//! Unified Error Type System
//!
//! Centralized error types for the entire application.
//!
//! ## Provider Failure Kinds
//!
//! - **RateLimited**: quota or throttling (wait, retry, then fall back)
//! - **Overloaded**: provider temporarily saturated (short retry, then fall back)
//! - **NotFound**: model or endpoint missing (fall back immediately)
//! - **BadRequest**: malformed request or credential (fall back immediately)
//! - **Timeout**: per-attempt deadline exceeded (retry once)
//! - **Transport**: network-level failure (retry with backoff)
//! - **Unknown**: anything unclassified (fall back immediately)

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use thiserror::Error;

use crate::ai::validation::ExtractionError;
use crate::constants::chain as chain_constants;

// =============================================================================
// Error Kinds
// =============================================================================

/// Closed set of provider failure kinds driving retry and fallback decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    RateLimited,
    Overloaded,
    NotFound,
    BadRequest,
    Timeout,
    Transport,
    Unknown,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimited => write!(f, "RATE_LIMITED"),
            Self::Overloaded => write!(f, "OVERLOADED"),
            Self::NotFound => write!(f, "NOT_FOUND"),
            Self::BadRequest => write!(f, "BAD_REQUEST"),
            Self::Timeout => write!(f, "TIMEOUT"),
            Self::Transport => write!(f, "TRANSPORT"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl ErrorKind {
    /// Check if this kind may be retried on the same candidate
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::Overloaded | Self::Timeout | Self::Transport
        )
    }

    /// Maximum attempts on one candidate once a failure of this kind was seen
    pub fn attempt_budget(&self, max_retries: u8) -> u8 {
        let max_retries = max_retries.max(1);
        match self {
            Self::RateLimited | Self::Transport => max_retries,
            Self::Overloaded => max_retries.min(chain_constants::OVERLOADED_MAX_ATTEMPTS),
            Self::Timeout => max_retries.min(chain_constants::TIMEOUT_MAX_ATTEMPTS),
            Self::NotFound | Self::BadRequest | Self::Unknown => 1,
        }
    }
}

// =============================================================================
// Provider Failure
// =============================================================================

/// A classified failure returned by one provider call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFailure {
    pub kind: ErrorKind,
    pub message: String,
    /// HTTP status of the response, when one was received
    pub status: Option<u16>,
    /// Provider-supplied wait hint (whole seconds, rounded up)
    pub retry_after_secs: Option<u64>,
}

impl std::fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "[{} {}] {}", self.kind, status, self.message),
            None => write!(f, "[{}] {}", self.kind, self.message),
        }
    }
}

impl ProviderFailure {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            retry_after_secs: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn retry_after(mut self, secs: u64) -> Self {
        self.retry_after_secs = Some(secs);
        self
    }

    pub fn timeout(duration: Duration) -> Self {
        Self::new(
            ErrorKind::Timeout,
            format!("no response within {:.1}s", duration.as_secs_f64()),
        )
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }
}

// =============================================================================
// Error Classifier
// =============================================================================

static RETRY_IN_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)retry in\s+(\d+(?:\.\d+)?)\s*s").ok());

static DURATION_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+(?:\.\d+)?)\s*s?\s*$").ok());

/// Maps raw provider error signals onto [`ErrorKind`]
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Classify a provider error. First matching rule wins:
    /// numeric status, then structured status string, then message substrings.
    pub fn classify(status: Option<u16>, provider_status: Option<&str>, message: &str) -> ErrorKind {
        if let Some(kind) = status.and_then(Self::classify_http_status) {
            return kind;
        }

        if let Some(kind) = provider_status.and_then(Self::classify_status_string) {
            return kind;
        }

        Self::classify_message(message)
    }

    /// Build a classified failure with the retry hint found in the message, if any
    pub fn failure(status: Option<u16>, provider_status: Option<&str>, message: &str) -> ProviderFailure {
        let kind = Self::classify(status, provider_status, message);
        let mut failure = ProviderFailure::new(kind, message);
        failure.status = status;
        failure.retry_after_secs = parse_retry_after(message);
        failure
    }

    fn classify_http_status(status: u16) -> Option<ErrorKind> {
        match status {
            429 => Some(ErrorKind::RateLimited),
            503 | 502 => Some(ErrorKind::Overloaded),
            404 => Some(ErrorKind::NotFound),
            400 | 401 | 403 => Some(ErrorKind::BadRequest),
            408 | 504 => Some(ErrorKind::Timeout),
            _ => None,
        }
    }

    fn classify_status_string(status: &str) -> Option<ErrorKind> {
        match status.trim().to_ascii_uppercase().as_str() {
            "RESOURCE_EXHAUSTED" => Some(ErrorKind::RateLimited),
            "UNAVAILABLE" => Some(ErrorKind::Overloaded),
            "NOT_FOUND" => Some(ErrorKind::NotFound),
            "INVALID_ARGUMENT" | "PERMISSION_DENIED" | "UNAUTHENTICATED" => {
                Some(ErrorKind::BadRequest)
            }
            "DEADLINE_EXCEEDED" => Some(ErrorKind::Timeout),
            _ => None,
        }
    }

    fn classify_message(message: &str) -> ErrorKind {
        let lower = message.to_lowercase();

        if lower.contains("429") || lower.contains("quota") || lower.contains("rate limit") {
            return ErrorKind::RateLimited;
        }
        if lower.contains("overloaded") {
            return ErrorKind::Overloaded;
        }
        if lower.contains("not found") {
            return ErrorKind::NotFound;
        }

        ErrorKind::Unknown
    }
}

/// Extract a "retry in Ns" hint from an error message, rounding up fractions
pub fn parse_retry_after(message: &str) -> Option<u64> {
    let pattern = RETRY_IN_PATTERN.as_ref()?;
    let captures = pattern.captures(message)?;
    parse_seconds(captures.get(1)?.as_str())
}

/// Parse a duration string such as `"12s"`, `"12.5s"` or `"30"` into whole seconds, rounding up
pub fn parse_duration_secs(value: &str) -> Option<u64> {
    let pattern = DURATION_PATTERN.as_ref()?;
    let captures = pattern.captures(value)?;
    parse_seconds(captures.get(1)?.as_str())
}

fn parse_seconds(number: &str) -> Option<u64> {
    let secs: f64 = number.parse().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Some(secs.ceil() as u64)
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum InsightError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // -------------------------------------------------------------------------
    // Generation Errors
    // -------------------------------------------------------------------------
    /// Every candidate was rate limited
    #[error("AI quota exceeded: {message}")]
    QuotaExceeded {
        message: String,
        retry_after_secs: Option<u64>,
    },

    /// Every candidate failed and at least one failure was not a rate limit
    #[error("Generation failed ({kind}): {message}")]
    GenerationFailed { kind: ErrorKind, message: String },

    /// The provider answered but its output could not be parsed
    #[error("Could not parse model output: {0}")]
    Unparseable(#[from] ExtractionError),

    #[error("Timeout after {duration:?}: {operation}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    // -------------------------------------------------------------------------
    // Request Errors
    // -------------------------------------------------------------------------
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // -------------------------------------------------------------------------
    // Domain Errors
    // -------------------------------------------------------------------------
    #[error("Missing credential for {provider}: set {env_var}")]
    MissingCredential { provider: String, env_var: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Lookup failed: {0}")]
    Lookup(String),
}

pub type Result<T> = std::result::Result<T, InsightError>;

impl InsightError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// HTTP status code this error maps onto at the response boundary
    pub fn http_status(&self) -> u16 {
        match self {
            Self::QuotaExceeded { .. } => 429,
            Self::GenerationFailed {
                kind: ErrorKind::Timeout,
                ..
            }
            | Self::Timeout { .. } => 504,
            Self::InvalidRequest(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            _ => 500,
        }
    }
}

/// Context extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn with_context<C: Into<String>>(self, context: C) -> Result<T>;

    /// Add context using a closure (lazy evaluation)
    fn with_context_fn<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>;
}

impl<T, E: std::error::Error + Send + Sync + 'static> ResultExt<T> for std::result::Result<T, E> {
    fn with_context<C: Into<String>>(self, context: C) -> Result<T> {
        self.map_err(|e| InsightError::Storage(format!("{}: {}", context.into(), e)))
    }

    fn with_context_fn<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>,
    {
        self.map_err(|e| InsightError::Storage(format!("{}: {}", f().into(), e)))
    }
}

// =============================================================================
// Tests
// =============================================================================
