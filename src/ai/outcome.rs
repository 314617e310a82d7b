//! Generation request and outcome types

use serde::Serialize;
use serde_json::Value;

use crate::ai::prompt::Prompt;
use crate::ai::provider::{Candidate, ProviderKind};
use crate::ai::validation::{ExtractionError, StructuredShape};
use crate::constants::chain as chain_constants;
use crate::types::{ErrorKind, InsightError, Result};

/// Expected form of the model output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputShape {
    RawText,
    JsonObject,
    JsonArray,
}

impl OutputShape {
    pub fn structured(&self) -> Option<StructuredShape> {
        match self {
            Self::RawText => None,
            Self::JsonObject => Some(StructuredShape::Object),
            Self::JsonArray => Some(StructuredShape::Array),
        }
    }
}

/// One generation call: what to ask, whom to ask, and what to expect back
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    prompt: Prompt,
    candidates: Vec<Candidate>,
    shape: OutputShape,
    max_retries: u8,
}

impl GenerationRequest {
    pub fn new(prompt: Prompt, candidates: Vec<Candidate>, shape: OutputShape) -> Result<Self> {
        if prompt.is_empty() {
            return Err(InsightError::invalid("generation prompt is empty"));
        }
        if candidates.is_empty() {
            return Err(InsightError::invalid("no provider candidates configured"));
        }
        Ok(Self {
            prompt,
            candidates,
            shape,
            max_retries: chain_constants::DEFAULT_MAX_RETRIES,
        })
    }

    /// Attempts per candidate for retryable failures (at least 1)
    pub fn with_max_retries(mut self, max_retries: u8) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    pub fn prompt(&self) -> &Prompt {
        &self.prompt
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn shape(&self) -> OutputShape {
        self.shape
    }

    pub fn max_retries(&self) -> u8 {
        self.max_retries
    }
}

/// Extracted model output
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(String),
    Json(Value),
}

impl Payload {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Json(_) => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Text(_) => None,
        }
    }

    pub fn into_json(self) -> Option<Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Text(_) => None,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Json(value) => value.to_string(),
        }
    }
}

/// One provider call (or breaker skip) issued during a generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptRecord {
    pub provider: ProviderKind,
    pub model: String,
    /// 1-based attempt number on this candidate; 0 for a skipped candidate
    pub attempt: u8,
    /// `None` on success
    #[serde(serialize_with = "serialize_kind")]
    pub kind: Option<ErrorKind>,
    pub duration_ms: u64,
    /// Delay slept after this attempt before the next one on the same candidate
    pub backoff_ms: u64,
}

impl AttemptRecord {
    pub fn skipped(&self) -> bool {
        self.attempt == 0
    }
}

fn serialize_kind<S: serde::Serializer>(kind: &Option<ErrorKind>, s: S) -> std::result::Result<S::Ok, S::Error> {
    match kind {
        Some(kind) => s.serialize_str(&kind.to_string()),
        None => s.serialize_none(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSuccess {
    pub payload: Payload,
    pub provider: ProviderKind,
    pub model: String,
    pub attempts: Vec<AttemptRecord>,
    /// The winning candidate was not the first in the list
    pub fell_back: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Exhaustion {
    pub last_error_kind: ErrorKind,
    pub last_message: String,
    /// Every candidate's terminal failure was a rate limit
    pub all_rate_limited: bool,
    /// Smallest wait hint among rate-limited terminal failures
    pub retry_after_secs: Option<u64>,
    pub attempts: Vec<AttemptRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnparseableOutput {
    pub error: ExtractionError,
    pub provider: ProviderKind,
    pub model: String,
    pub raw_text: String,
    pub attempts: Vec<AttemptRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    Success(GenerationSuccess),
    Exhausted(Exhaustion),
    Unparseable(UnparseableOutput),
}

impl GenerationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn attempts(&self) -> &[AttemptRecord] {
        match self {
            Self::Success(s) => &s.attempts,
            Self::Exhausted(e) => &e.attempts,
            Self::Unparseable(u) => &u.attempts,
        }
    }

    /// Convert into the task-level error taxonomy
    pub fn into_result(self) -> Result<GenerationSuccess> {
        match self {
            Self::Success(success) => Ok(success),
            Self::Exhausted(exhaustion) if exhaustion.all_rate_limited => {
                Err(InsightError::QuotaExceeded {
                    message: format!(
                        "all providers are rate limited ({})",
                        exhaustion.last_message
                    ),
                    retry_after_secs: exhaustion.retry_after_secs,
                })
            }
            Self::Exhausted(exhaustion) => Err(InsightError::GenerationFailed {
                kind: exhaustion.last_error_kind,
                message: exhaustion.last_message,
            }),
            Self::Unparseable(output) => {
                tracing::debug!(
                    provider = %output.provider,
                    model = %output.model,
                    raw_len = output.raw_text.len(),
                    "Discarding unparseable output"
                );
                Err(InsightError::Unparseable(output.error))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::Credential;

    fn candidate() -> Candidate {
        Candidate::new(ProviderKind::Gemini, "gemini-flash-latest", Credential::new("k"))
    }

    fn exhaustion(kind: ErrorKind, all_rate_limited: bool) -> GenerationOutcome {
        GenerationOutcome::Exhausted(Exhaustion {
            last_error_kind: kind,
            last_message: "boom".to_string(),
            all_rate_limited,
            retry_after_secs: Some(13),
            attempts: Vec::new(),
        })
    }

    #[test]
    fn test_request_rejects_empty_inputs() {
        assert!(matches!(
            GenerationRequest::new(Prompt::user("  "), vec![candidate()], OutputShape::RawText),
            Err(InsightError::InvalidRequest(_))
        ));
        assert!(matches!(
            GenerationRequest::new(Prompt::user("hi"), Vec::new(), OutputShape::RawText),
            Err(InsightError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_request_max_retries_floor() {
        let request = GenerationRequest::new(Prompt::user("hi"), vec![candidate()], OutputShape::JsonArray)
            .unwrap()
            .with_max_retries(0);
        assert_eq!(request.max_retries(), 1);
        assert_eq!(request.shape().structured(), Some(StructuredShape::Array));
    }

    #[test]
    fn test_into_result_quota() {
        match exhaustion(ErrorKind::RateLimited, true).into_result() {
            Err(InsightError::QuotaExceeded { retry_after_secs, .. }) => {
                assert_eq!(retry_after_secs, Some(13))
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_into_result_timeout_maps_to_504() {
        let err = exhaustion(ErrorKind::Timeout, false).into_result().unwrap_err();
        assert_eq!(err.http_status(), 504);

        let err = exhaustion(ErrorKind::BadRequest, false).into_result().unwrap_err();
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn test_payload_accessors() {
        let payload = Payload::Json(serde_json::json!({"a": 1}));
        assert!(payload.as_text().is_none());
        assert_eq!(payload.as_json().unwrap()["a"], 1);
        assert_eq!(Payload::Text("x".into()).into_text(), "x");
    }
}
