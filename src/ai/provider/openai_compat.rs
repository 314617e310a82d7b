//! OpenAI-compatible chat completions wire format (NVIDIA NIM, OpenRouter)

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::http::{embedded_error, failure_from_body};
use crate::ai::prompt::Prompt;
use crate::types::{ErrorKind, ProviderFailure};

pub(super) fn endpoint(base: &str) -> Result<url::Url, ProviderFailure> {
    let raw = format!("{}/chat/completions", base.trim_end_matches('/'));
    url::Url::parse(&raw).map_err(|e| {
        ProviderFailure::new(ErrorKind::BadRequest, format!("invalid endpoint {}: {}", raw, e))
    })
}

pub(super) fn build_request(model: &str, prompt: &Prompt) -> ChatCompletionRequest {
    let mut messages = Vec::with_capacity(2);

    if let Some(system) = &prompt.system {
        messages.push(ChatMessage {
            role: "system".to_string(),
            content: MessageContent::Text(system.clone()),
        });
    }

    let user_content = if prompt.images.is_empty() {
        MessageContent::Text(prompt.user.clone())
    } else {
        let mut parts = vec![ContentPart::Text {
            text: prompt.user.clone(),
        }];
        parts.extend(prompt.images.iter().map(|image| ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: image.data_url(),
            },
        }));
        MessageContent::Parts(parts)
    };

    messages.push(ChatMessage {
        role: "user".to_string(),
        content: user_content,
    });

    ChatCompletionRequest {
        model: model.to_string(),
        messages,
        temperature: prompt.sampling.temperature,
        top_p: prompt.sampling.top_p,
        max_tokens: prompt.sampling.max_tokens,
        stream: false,
    }
}

/// Pull the assistant message out of a successful response body
pub(super) fn extract_text(body: &str) -> Result<String, ProviderFailure> {
    let value: Value = serde_json::from_str(body).map_err(|e| {
        ProviderFailure::new(ErrorKind::Unknown, format!("malformed completion response: {}", e))
    })?;

    if embedded_error(&value) {
        return Err(failure_from_body(None, body));
    }

    let response: ChatCompletionResponse = serde_json::from_value(value).map_err(|e| {
        ProviderFailure::new(ErrorKind::Unknown, format!("unexpected completion shape: {}", e))
    })?;

    let choice = response.choices.into_iter().next();
    let finish = choice
        .as_ref()
        .and_then(|c| c.finish_reason.clone())
        .unwrap_or_else(|| "none".to_string());

    match choice.and_then(|c| c.message.content) {
        Some(content) if !content.trim().is_empty() => Ok(content),
        _ => Err(ProviderFailure::new(
            ErrorKind::Unknown,
            format!("empty content in completion (finish reason: {})", finish),
        )),
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
pub(super) struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::prompt::{InlineImage, SamplingParams};
    use serde_json::json;

    #[test]
    fn test_build_request_text_only() {
        let prompt = Prompt::user("Summarize")
            .with_system("Answer in markdown")
            .with_sampling(SamplingParams::new().temperature(0.2).top_p(1.0).max_tokens(8192));

        let value = serde_json::to_value(build_request("meta/llama-3.1-405b-instruct", &prompt)).unwrap();
        assert_eq!(
            value,
            json!({
                "model": "meta/llama-3.1-405b-instruct",
                "messages": [
                    {"role": "system", "content": "Answer in markdown"},
                    {"role": "user", "content": "Summarize"}
                ],
                "temperature": 0.2f32,
                "top_p": 1.0,
                "max_tokens": 8192,
                "stream": false
            })
        );
    }

    #[test]
    fn test_build_request_with_image_parts() {
        let prompt = Prompt::user("Extract text").with_image(InlineImage::new("image/jpeg", "QUJD"));
        let value = serde_json::to_value(build_request("allenai/molmo-2-8b:free", &prompt)).unwrap();

        let content = &value["messages"][0]["content"];
        assert_eq!(content[0], json!({"type": "text", "text": "Extract text"}));
        assert_eq!(content[1]["type"], "image_url");
        assert_eq!(content[1]["image_url"]["url"], "data:image/jpeg;base64,QUJD");
        assert!(value.get("temperature").is_none());
    }

    #[test]
    fn test_extract_text() {
        let body = r#"{"choices": [{"message": {"role": "assistant", "content": "Fixed text."}, "finish_reason": "stop"}]}"#;
        assert_eq!(extract_text(body).unwrap(), "Fixed text.");
    }

    #[test]
    fn test_extract_text_empty_choices() {
        let failure = extract_text(r#"{"choices": []}"#).unwrap_err();
        assert_eq!(failure.kind, ErrorKind::Unknown);

        let failure = extract_text(r#"{"choices": [{"message": {"content": null}, "finish_reason": "length"}]}"#).unwrap_err();
        assert!(failure.message.contains("length"));
    }

    #[test]
    fn test_extract_text_embedded_rate_limit() {
        let body = r#"{"error": {"code": 429, "message": "Rate limit exceeded: free-models-per-min"}}"#;
        assert_eq!(extract_text(body).unwrap_err().kind, ErrorKind::RateLimited);
    }

    #[test]
    fn test_endpoint() {
        assert_eq!(
            endpoint("https://openrouter.ai/api/v1/").unwrap().as_str(),
            "https://openrouter.ai/api/v1/chat/completions"
        );
    }
}
