//! HTTP Provider Adapter
//!
//! reqwest-backed [`ProviderAdapter`] that dispatches on the candidate's
//! provider kind and classifies every non-success into a [`ProviderFailure`].

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use serde_json::Value;
use tracing::{debug, warn};

use super::{AttemptResult, Candidate, ProviderAdapter, ProviderKind, gemini, openai_compat};
use crate::ai::prompt::Prompt;
use crate::constants::network as net_constants;
use crate::types::{
    ErrorClassifier, ErrorKind, InsightError, ProviderFailure, Result, parse_duration_secs,
    truncate_chars,
};

const MAX_ERROR_MESSAGE_CHARS: usize = 500;

/// API base URLs and optional attribution headers
#[derive(Debug, Clone)]
pub struct ProviderEndpoints {
    pub gemini: String,
    pub nvidia: String,
    pub openrouter: String,
    /// Sent as `HTTP-Referer` to OpenRouter
    pub openrouter_referer: Option<String>,
    /// Sent as `X-Title` to OpenRouter
    pub openrouter_title: Option<String>,
}

impl Default for ProviderEndpoints {
    fn default() -> Self {
        Self {
            gemini: ProviderKind::Gemini.default_api_base().to_string(),
            nvidia: ProviderKind::Nvidia.default_api_base().to_string(),
            openrouter: ProviderKind::OpenRouter.default_api_base().to_string(),
            openrouter_referer: None,
            openrouter_title: None,
        }
    }
}

impl ProviderEndpoints {
    pub fn base(&self, kind: ProviderKind) -> &str {
        match kind {
            ProviderKind::Gemini => &self.gemini,
            ProviderKind::Nvidia => &self.nvidia,
            ProviderKind::OpenRouter => &self.openrouter,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for kind in ProviderKind::ALL {
            let base = self.base(kind);
            let url = url::Url::parse(base).map_err(|e| {
                InsightError::Config(format!("Invalid {} API base '{}': {}", kind, base, e))
            })?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(InsightError::Config(format!(
                    "Invalid {} API base '{}': scheme must be http or https",
                    kind, base
                )));
            }
        }
        Ok(())
    }
}

/// Provider adapter speaking Gemini and OpenAI-compatible HTTP APIs
pub struct HttpProviderAdapter {
    client: reqwest::Client,
    endpoints: ProviderEndpoints,
}

impl std::fmt::Debug for HttpProviderAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProviderAdapter")
            .field("endpoints", &self.endpoints)
            .finish()
    }
}

impl HttpProviderAdapter {
    pub fn new(endpoints: ProviderEndpoints) -> Result<Self> {
        endpoints.validate()?;

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(net_constants::CONNECTION_TIMEOUT_SECS))
            .build()
            .map_err(|e| InsightError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, endpoints })
    }

    async fn send_gemini(
        &self,
        candidate: &Candidate,
        prompt: &Prompt,
    ) -> std::result::Result<String, ProviderFailure> {
        let url = gemini::endpoint(self.endpoints.base(ProviderKind::Gemini), &candidate.model)?;
        let body = gemini::build_request(prompt);

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", candidate.credential.expose())
            .timeout(candidate.timeout)
            .json(&body)
            .send()
            .await
            .map_err(transport_failure)?;

        let text = read_response(response).await?;
        gemini::extract_text(&text)
    }

    async fn send_chat(
        &self,
        candidate: &Candidate,
        prompt: &Prompt,
    ) -> std::result::Result<String, ProviderFailure> {
        let url = openai_compat::endpoint(self.endpoints.base(candidate.provider))?;
        let body = openai_compat::build_request(&candidate.model, prompt);

        let mut request = self
            .client
            .post(url)
            .bearer_auth(candidate.credential.expose())
            .timeout(candidate.timeout)
            .json(&body);

        if candidate.provider == ProviderKind::OpenRouter {
            if let Some(referer) = &self.endpoints.openrouter_referer {
                request = request.header("HTTP-Referer", referer);
            }
            if let Some(title) = &self.endpoints.openrouter_title {
                request = request.header("X-Title", title);
            }
        }

        let response = request.send().await.map_err(transport_failure)?;
        let text = read_response(response).await?;
        openai_compat::extract_text(&text)
    }
}

#[async_trait]
impl ProviderAdapter for HttpProviderAdapter {
    async fn send(&self, candidate: &Candidate, prompt: &Prompt) -> AttemptResult {
        let start = Instant::now();

        let result = match candidate.provider {
            ProviderKind::Gemini => self.send_gemini(candidate, prompt).await,
            ProviderKind::Nvidia | ProviderKind::OpenRouter => {
                self.send_chat(candidate, prompt).await
            }
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;
        match result {
            Ok(text) => {
                debug!(candidate = %candidate, elapsed_ms, chars = text.len(), "Provider responded");
                AttemptResult::success(text)
            }
            Err(failure) => {
                warn!(candidate = %candidate, elapsed_ms, %failure, "Provider call failed");
                AttemptResult::Failure(failure)
            }
        }
    }
}

// =============================================================================
// Response Handling
// =============================================================================

async fn read_response(response: reqwest::Response) -> std::result::Result<String, ProviderFailure> {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_duration_secs);

    let body = response.text().await.map_err(transport_failure)?;

    if !status.is_success() {
        let mut failure = failure_from_body(Some(status.as_u16()), &body);
        if retry_after.is_some() {
            failure.retry_after_secs = retry_after;
        }
        return Err(failure);
    }

    Ok(body)
}

fn transport_failure(err: reqwest::Error) -> ProviderFailure {
    if err.is_timeout() {
        ProviderFailure::new(ErrorKind::Timeout, format!("request timed out: {}", err))
    } else {
        ProviderFailure::transport(err.to_string())
    }
}

/// Error fields pulled from the provider's JSON error body
#[derive(Debug, Default, PartialEq, Eq)]
struct ErrorDetails {
    code: Option<u16>,
    status: Option<String>,
    message: Option<String>,
    retry_delay_secs: Option<u64>,
}

impl ErrorDetails {
    fn from_value(value: &Value) -> Self {
        let value = match value {
            Value::Array(items) => items.first().unwrap_or(value),
            other => other,
        };

        match value.get("error") {
            Some(Value::Object(_)) => {
                let err = &value["error"];
                let mut message = err.get("message").and_then(Value::as_str).map(String::from);
                if let Some(raw) = err.pointer("/metadata/raw").and_then(Value::as_str) {
                    message = Some(match message {
                        Some(m) => format!("{} ({})", m, raw),
                        None => raw.to_string(),
                    });
                }

                Self {
                    code: err
                        .get("code")
                        .and_then(Value::as_u64)
                        .and_then(|c| u16::try_from(c).ok()),
                    status: err.get("status").and_then(Value::as_str).map(String::from),
                    message,
                    retry_delay_secs: retry_info_delay(err),
                }
            }
            Some(Value::String(message)) => Self {
                message: Some(message.clone()),
                ..Self::default()
            },
            _ => Self {
                code: value
                    .get("status")
                    .and_then(Value::as_u64)
                    .and_then(|c| u16::try_from(c).ok()),
                status: value.get("status").and_then(Value::as_str).map(String::from),
                message: ["detail", "message", "title"]
                    .iter()
                    .find_map(|key| value.get(*key).and_then(Value::as_str))
                    .map(String::from),
                retry_delay_secs: None,
            },
        }
    }
}

/// Gemini `google.rpc.RetryInfo` detail
fn retry_info_delay(err: &Value) -> Option<u64> {
    err.get("details")?
        .as_array()?
        .iter()
        .filter(|d| {
            d.get("@type")
                .and_then(Value::as_str)
                .is_some_and(|t| t.ends_with("RetryInfo"))
        })
        .find_map(|d| d.get("retryDelay").and_then(Value::as_str))
        .and_then(parse_duration_secs)
}

/// Classify an error body. `status` is the HTTP status when the body came
/// from a non-success response; otherwise the body's own error code is used.
pub(super) fn failure_from_body(status: Option<u16>, body: &str) -> ProviderFailure {
    let details = serde_json::from_str::<Value>(body)
        .ok()
        .map(|v| ErrorDetails::from_value(&v))
        .unwrap_or_default();

    let status = status.or(details.code);
    let message = details.message.clone().unwrap_or_else(|| {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            "empty error body".to_string()
        } else {
            truncate_chars(trimmed, MAX_ERROR_MESSAGE_CHARS).to_string()
        }
    });

    let mut failure = ErrorClassifier::failure(status, details.status.as_deref(), &message);
    if details.retry_delay_secs.is_some() {
        failure.retry_after_secs = details.retry_delay_secs;
    }
    failure
}

/// Check a 200 body for an embedded error object
pub(super) fn embedded_error(value: &Value) -> bool {
    value.get("error").is_some_and(|e| !e.is_null())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gemini_quota_body() {
        let body = r#"{
            "error": {
                "code": 429,
                "message": "You exceeded your current quota. Please retry in 12.5s.",
                "status": "RESOURCE_EXHAUSTED",
                "details": [
                    {"@type": "type.googleapis.com/google.rpc.QuotaFailure"},
                    {"@type": "type.googleapis.com/google.rpc.RetryInfo", "retryDelay": "12s"}
                ]
            }
        }"#;

        let failure = failure_from_body(Some(429), body);
        assert_eq!(failure.kind, ErrorKind::RateLimited);
        assert_eq!(failure.status, Some(429));
        assert_eq!(failure.retry_after_secs, Some(12));
        assert!(failure.message.contains("quota"));
    }

    #[test]
    fn test_message_hint_used_without_retry_info() {
        let body = r#"{"error": {"code": 429, "message": "Please retry in 12.5s.", "status": "RESOURCE_EXHAUSTED"}}"#;
        let failure = failure_from_body(Some(429), body);
        assert_eq!(failure.retry_after_secs, Some(13));
    }

    #[test]
    fn test_openrouter_embedded_error() {
        let body = r#"{"error": {"code": 429, "message": "Provider returned error", "metadata": {"raw": "free-models-per-day limit"}}}"#;
        let value: Value = serde_json::from_str(body).unwrap();
        assert!(embedded_error(&value));

        let failure = failure_from_body(None, body);
        assert_eq!(failure.kind, ErrorKind::RateLimited);
        assert!(failure.message.contains("free-models-per-day"));
    }

    #[test]
    fn test_nvidia_problem_details() {
        let body = r#"{"status": 404, "title": "Not Found", "detail": "Function not found for account"}"#;
        let failure = failure_from_body(Some(404), body);
        assert_eq!(failure.kind, ErrorKind::NotFound);
        assert_eq!(failure.message, "Function not found for account");
    }

    #[test]
    fn test_string_error_and_plain_body() {
        let failure = failure_from_body(Some(500), r#"{"error": "The model is overloaded"}"#);
        assert_eq!(failure.kind, ErrorKind::Overloaded);

        let failure = failure_from_body(Some(500), "<html>gateway exploded</html>");
        assert_eq!(failure.kind, ErrorKind::Unknown);
        assert_eq!(failure.message, "<html>gateway exploded</html>");

        let failure = failure_from_body(Some(502), "");
        assert_eq!(failure.kind, ErrorKind::Overloaded);
        assert_eq!(failure.message, "empty error body");
    }

    #[test]
    fn test_gemini_array_wrapped_error() {
        let body = r#"[{"error": {"code": 503, "message": "busy", "status": "UNAVAILABLE"}}]"#;
        let failure = failure_from_body(None, body);
        assert_eq!(failure.kind, ErrorKind::Overloaded);
        assert_eq!(failure.status, Some(503));
    }

    #[test]
    fn test_endpoint_validation() {
        assert!(HttpProviderAdapter::new(ProviderEndpoints::default()).is_ok());

        let bad = ProviderEndpoints {
            nvidia: "ftp://example.com".into(),
            ..Default::default()
        };
        assert!(matches!(
            HttpProviderAdapter::new(bad),
            Err(InsightError::Config(_))
        ));
    }
}
