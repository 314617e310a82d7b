//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Resilient client constants
pub mod chain {
    /// Default maximum attempts per candidate for retryable failures
    pub const DEFAULT_MAX_RETRIES: u8 = 3;

    /// Attempts allowed per candidate when the provider reports overload
    pub const OVERLOADED_MAX_ATTEMPTS: u8 = 2;

    /// Attempts allowed per candidate for timeouts (one retry)
    pub const TIMEOUT_MAX_ATTEMPTS: u8 = 2;
}

/// Backoff constants
pub mod backoff {
    /// Base delay for exponential backoff (milliseconds)
    pub const BASE_DELAY_MS: u64 = 1000;

    /// Maximum computed backoff delay (milliseconds)
    pub const MAX_DELAY_MS: u64 = 30_000;

    /// Upper bound (exclusive) of the uniform jitter added to each delay (milliseconds)
    pub const MAX_JITTER_MS: u64 = 250;

    /// Provider-supplied retry-after hints above this are clamped (seconds)
    pub const RETRY_AFTER_CAP_SECS: u64 = 120;
}

/// Quota circuit breaker constants
pub mod circuit_breaker {
    /// Cooldown applied when a provider is rate limited without a retry hint (seconds)
    pub const DEFAULT_COOLDOWN_SECS: u64 = 60;

    /// Trial calls admitted while half-open
    pub const HALF_OPEN_MAX_REQUESTS: u32 = 1;

    /// Longest time a breaker stays open (seconds)
    pub const MAX_COOLDOWN_SECS: u64 = 86_400;
}

/// HTTP boundary constants
pub mod envelope {
    /// `retryAfter` reported for quota exhaustion when no provider hint exists (seconds)
    pub const DEFAULT_RETRY_AFTER_SECS: u64 = 30;
}

/// Task-level constants
pub mod tasks {
    /// Fixed delay between sequential chapter generations (milliseconds)
    pub const CHAPTER_DELAY_MS: u64 = 2000;

    /// Default number of quiz questions
    pub const DEFAULT_QUIZ_QUESTIONS: u32 = 5;

    /// Upper bound on requested quiz questions
    pub const MAX_QUIZ_QUESTIONS: u32 = 50;

    /// Grammar input is truncated to this many words
    pub const GRAMMAR_MAX_WORDS: usize = 2000;

    /// Video summary prompt context is capped at this many characters
    pub const SUMMARY_MAX_CHARS: usize = 15_000;

    /// PDF text passed as chat context is capped at this many characters
    pub const PDF_CONTEXT_MAX_CHARS: usize = 60_000;
}

/// Pollinations prompt-to-image endpoint, used for banners and the image tool
pub mod banner {
    /// Prompt-to-image endpoint; the encoded prompt is appended as a path segment
    pub const PROMPT_URL: &str = "https://image.pollinations.ai/prompt";

    /// Image generation can take a while on a cold prompt (seconds)
    pub const FETCH_TIMEOUT_SECS: u64 = 120;
}

/// HTTP/Network constants
pub mod network {
    /// Default per-attempt timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

    /// Connection timeout (seconds)
    pub const CONNECTION_TIMEOUT_SECS: u64 = 30;

    /// Timeout for auxiliary lookups such as video search (seconds)
    pub const LOOKUP_TIMEOUT_SECS: u64 = 15;
}

/// YouTube Data API constants
pub mod youtube {
    pub const SEARCH_URL: &str = "https://www.googleapis.com/youtube/v3/search";
    pub const OEMBED_URL: &str = "https://www.youtube.com/oembed";
    pub const MAX_RESULTS: u32 = 5;
}
