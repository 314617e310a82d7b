//! AI Integration Layer
//!
//! Provider adapters, the resilient multi-candidate client, and extraction of
//! structured output from model text.

pub mod client;
pub mod clock;
pub mod outcome;
pub mod preflight;
pub mod prompt;
pub mod provider;
pub mod timeout;
pub mod validation;

pub use client::{BackoffPolicy, ClientConfig, ResilientClient};
pub use clock::{Clock, ManualClock, TokioClock};
pub use outcome::{
    AttemptRecord, Exhaustion, GenerationOutcome, GenerationRequest, GenerationSuccess,
    OutputShape, Payload, UnparseableOutput,
};
pub use preflight::{CheckResult, PreflightCheck, PreflightResult};
pub use prompt::{InlineImage, Prompt, PromptBuilder, SamplingParams};
pub use provider::{
    AttemptResult, Candidate, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats,
    CircuitState, Credential, HttpProviderAdapter, ProviderAdapter, ProviderEndpoints,
    ProviderKind, SharedAdapter,
};
pub use timeout::{attempt_with_timeout, with_timeout};
pub use validation::{ExtractionError, StructuredShape, extract_structured};
