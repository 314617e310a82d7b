//! Google Gemini `generateContent` wire format

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::http::{embedded_error, failure_from_body};
use crate::ai::prompt::Prompt;
use crate::types::{ErrorKind, ProviderFailure};

pub(super) fn endpoint(base: &str, model: &str) -> Result<url::Url, ProviderFailure> {
    let raw = format!("{}/models/{}:generateContent", base.trim_end_matches('/'), model);
    url::Url::parse(&raw).map_err(|e| {
        ProviderFailure::new(ErrorKind::BadRequest, format!("invalid Gemini endpoint {}: {}", raw, e))
    })
}

pub(super) fn build_request(prompt: &Prompt) -> GenerateContentRequest {
    let mut parts = vec![Part::text(&prompt.user)];
    parts.extend(prompt.images.iter().map(|image| Part {
        text: None,
        inline_data: Some(InlineData {
            mime_type: image.mime_type.clone(),
            data: image.base64_data.clone(),
        }),
    }));

    let sampling = prompt.sampling;
    let generation_config = (sampling.temperature.is_some()
        || sampling.top_p.is_some()
        || sampling.max_tokens.is_some())
    .then_some(GenerationConfig {
        temperature: sampling.temperature,
        top_p: sampling.top_p,
        max_output_tokens: sampling.max_tokens,
    });

    GenerateContentRequest {
        contents: vec![Content {
            role: Some("user".to_string()),
            parts,
        }],
        system_instruction: prompt.system.as_ref().map(|system| Content {
            role: None,
            parts: vec![Part::text(system)],
        }),
        generation_config,
    }
}

/// Pull the generated text out of a successful response body
pub(super) fn extract_text(body: &str) -> Result<String, ProviderFailure> {
    let value: Value = serde_json::from_str(body).map_err(|e| {
        ProviderFailure::new(ErrorKind::Unknown, format!("malformed Gemini response: {}", e))
    })?;

    if embedded_error(&value) {
        return Err(failure_from_body(None, body));
    }

    let response: GenerateContentResponse = serde_json::from_value(value).map_err(|e| {
        ProviderFailure::new(ErrorKind::Unknown, format!("unexpected Gemini response shape: {}", e))
    })?;

    let text: String = response
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .map(|content| {
            content
                .parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect()
        })
        .unwrap_or_default();

    if !text.trim().is_empty() {
        return Ok(text);
    }

    if let Some(reason) = response
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.as_deref())
    {
        return Err(ProviderFailure::new(
            ErrorKind::BadRequest,
            format!("prompt blocked by Gemini: {}", reason),
        ));
    }

    let finish = response
        .candidates
        .first()
        .and_then(|c| c.finish_reason.as_deref())
        .unwrap_or("none");
    Err(ProviderFailure::new(
        ErrorKind::Unknown,
        format!("empty content from Gemini (finish reason: {})", finish),
    ))
}

// Request/Response types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl Part {
    fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            inline_data: None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseCandidate {
    content: Option<ResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::prompt::{InlineImage, SamplingParams};
    use serde_json::json;

    #[test]
    fn test_build_request_plain() {
        let request = build_request(&Prompt::user("Explain ownership"));
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({"contents": [{"role": "user", "parts": [{"text": "Explain ownership"}]}]})
        );
    }

    #[test]
    fn test_build_request_with_system_image_and_sampling() {
        let prompt = Prompt::user("Read this")
            .with_system("Be terse")
            .with_image(InlineImage::new("image/png", "QUJD"))
            .with_sampling(SamplingParams::new().temperature(0.2).max_tokens(512));

        let value = serde_json::to_value(build_request(&prompt)).unwrap();
        assert_eq!(value["systemInstruction"]["parts"][0]["text"], "Be terse");
        assert_eq!(value["contents"][0]["parts"][1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 512);
        assert!(value["generationConfig"].get("topP").is_none());
    }

    #[test]
    fn test_endpoint() {
        let url = endpoint("https://generativelanguage.googleapis.com/v1beta/", "gemini-flash-latest").unwrap();
        assert_eq!(
            url.as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-flash-latest:generateContent"
        );
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let body = r#"{"candidates": [{"content": {"parts": [{"text": "Hello "}, {"text": "world"}]}, "finishReason": "STOP"}]}"#;
        assert_eq!(extract_text(body).unwrap(), "Hello world");
    }

    #[test]
    fn test_extract_text_blocked_prompt() {
        let body = r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#;
        let failure = extract_text(body).unwrap_err();
        assert_eq!(failure.kind, ErrorKind::BadRequest);
    }

    #[test]
    fn test_extract_text_empty_candidate() {
        let body = r#"{"candidates": [{"finishReason": "MAX_TOKENS"}]}"#;
        let failure = extract_text(body).unwrap_err();
        assert_eq!(failure.kind, ErrorKind::Unknown);
        assert!(failure.message.contains("MAX_TOKENS"));
    }

    #[test]
    fn test_extract_text_embedded_error() {
        let body = r#"{"error": {"code": 429, "message": "quota", "status": "RESOURCE_EXHAUSTED"}}"#;
        assert_eq!(extract_text(body).unwrap_err().kind, ErrorKind::RateLimited);
    }
}
