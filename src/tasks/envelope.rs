//! Response envelope
//!
//! Success bodies are `{ "success": true, ...fields }`. Failures are
//! `{ "success": false, "message": ..., "retryAfter"?: secs }` with the status
//! taken from [`InsightError::http_status`].

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::constants::envelope::DEFAULT_RETRY_AFTER_SECS;
use crate::types::{ErrorKind, InsightError, Result};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    /// 200 with `success: true` merged into `fields`
    pub fn ok(fields: Value) -> Self {
        let mut body = match fields {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("data".to_string(), other);
                map
            }
        };
        body.insert("success".to_string(), Value::Bool(true));
        Self {
            status: 200,
            body: Value::Object(body),
        }
    }

    pub fn from_error(err: &InsightError) -> Self {
        let status = err.http_status();
        let body = match err {
            InsightError::QuotaExceeded { retry_after_secs, .. } => json!({
                "success": false,
                "message": "AI quota exceeded. Please retry later.",
                "retryAfter": retry_after_secs.unwrap_or(DEFAULT_RETRY_AFTER_SECS),
            }),
            InsightError::GenerationFailed {
                kind: ErrorKind::Timeout,
                ..
            }
            | InsightError::Timeout { .. } => json!({
                "success": false,
                "message": "Request timeout. Please try again.",
            }),
            InsightError::Unparseable(e) => json!({
                "success": false,
                "message": "Could not parse model output",
                "details": e.to_string(),
            }),
            InsightError::GenerationFailed { message, .. } => json!({
                "success": false,
                "message": message,
            }),
            InsightError::InvalidRequest(message)
            | InsightError::Unauthorized(message)
            | InsightError::Forbidden(message)
            | InsightError::NotFound(message)
            | InsightError::Lookup(message) => json!({
                "success": false,
                "message": message,
            }),
            other => json!({
                "success": false,
                "message": other.to_string(),
            }),
        };
        Self { status, body }
    }

    /// Collapse a task result into its envelope
    pub fn from_result(result: Result<Value>) -> Self {
        match result {
            Ok(fields) => Self::ok(fields),
            Err(e) => Self::from_error(&e),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status < 400
    }

    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(&self.body).unwrap_or_else(|_| self.body.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::validation::ExtractionError;
    use std::time::Duration;

    #[test]
    fn test_ok_merges_success_flag() {
        let resp = ApiResponse::ok(json!({"courseId": "abc"}));
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, json!({"success": true, "courseId": "abc"}));
    }

    #[test]
    fn test_quota_defaults_retry_after() {
        let resp = ApiResponse::from_error(&InsightError::QuotaExceeded {
            message: "all providers are rate limited".into(),
            retry_after_secs: None,
        });
        assert_eq!(resp.status, 429);
        assert_eq!(resp.body["retryAfter"], 30);
        assert_eq!(resp.body["success"], false);
    }

    #[test]
    fn test_quota_keeps_provider_hint() {
        let resp = ApiResponse::from_error(&InsightError::QuotaExceeded {
            message: String::new(),
            retry_after_secs: Some(7),
        });
        assert_eq!(resp.body["retryAfter"], 7);
    }

    #[test]
    fn test_timeouts_map_to_504() {
        let exhausted = InsightError::GenerationFailed {
            kind: ErrorKind::Timeout,
            message: "timed out after 60s".into(),
        };
        assert_eq!(ApiResponse::from_error(&exhausted).status, 504);
        let direct = InsightError::timeout("lookup", Duration::from_secs(1));
        assert_eq!(ApiResponse::from_error(&direct).status, 504);
    }

    #[test]
    fn test_other_exhaustion_carries_last_message() {
        let resp = ApiResponse::from_error(&InsightError::GenerationFailed {
            kind: ErrorKind::BadRequest,
            message: "invalid argument".into(),
        });
        assert_eq!(resp.status, 500);
        assert_eq!(resp.body["message"], "invalid argument");
        assert!(resp.body.get("retryAfter").is_none());
    }

    #[test]
    fn test_request_errors() {
        let resp = ApiResponse::from_error(&InsightError::Forbidden("Unauthorized access".into()));
        assert_eq!(resp.status, 403);
        assert_eq!(resp.body["message"], "Unauthorized access");

        let unparseable = InsightError::Unparseable(ExtractionError::ParseFailed {
            reason: "eof".into(),
        });
        let resp = ApiResponse::from_error(&unparseable);
        assert_eq!(resp.status, 500);
        assert_eq!(resp.body["message"], "Could not parse model output");
    }

    #[test]
    fn test_from_result() {
        assert!(ApiResponse::from_result(Ok(json!({"answer": "hi"}))).is_success());
        assert!(!ApiResponse::from_result(Err(InsightError::invalid("Message is required"))).is_success());
    }
}
