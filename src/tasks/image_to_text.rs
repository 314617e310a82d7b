//! Image to text through a vision model

use serde::Deserialize;
use serde_json::json;

use super::{ApiResponse, TaskContext, require};
use crate::ai::{InlineImage, OutputShape, Prompt};
use crate::config::TaskKind;
use crate::types::Result;

const TOOL_NAME: &str = "Image to Text (Vision)";
const DEFAULT_INSTRUCTION: &str = "Extract all text from this image.";
const DEFAULT_MIME: &str = "image/png";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRequest {
    /// Raw base64 or a full `data:` URL
    pub image_base64: Option<String>,
    pub mime_type: Option<String>,
    pub prompt: Option<String>,
}

/// Split a `data:<mime>;base64,<payload>` URL; plain base64 passes through
fn split_data_url(input: &str) -> (Option<&str>, &str) {
    input
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(";base64,"))
        .map(|(mime, data)| (Some(mime), data))
        .unwrap_or((None, input))
}

pub fn vision_prompt(request: &ImageRequest, base64: &str, mime: &str) -> Prompt {
    let instruction = request
        .prompt
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_INSTRUCTION);
    Prompt::user(instruction).with_image(InlineImage::new(mime, base64))
}

pub async fn extract_text(ctx: &TaskContext, request: &ImageRequest) -> Result<String> {
    let image = require(request.image_base64.as_deref(), "Image is required")?;
    let (embedded_mime, data) = split_data_url(image);
    let data = require(Some(data), "Image is required")?;
    let mime = request
        .mime_type
        .as_deref()
        .or(embedded_mime)
        .unwrap_or(DEFAULT_MIME);

    let success = ctx
        .generate(TaskKind::ImageToText, vision_prompt(request, data, mime), OutputShape::RawText)
        .await?;
    Ok(success.payload.into_text().trim().to_string())
}

/// `{success, tool, text}`
pub async fn handle(ctx: &TaskContext, request: &ImageRequest) -> ApiResponse {
    ApiResponse::from_result(
        extract_text(ctx, request)
            .await
            .map(|text| json!({ "tool": TOOL_NAME, "text": text })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::test_support::harness;

    #[test]
    fn test_split_data_url() {
        assert_eq!(split_data_url("data:image/jpeg;base64,QUJD"), (Some("image/jpeg"), "QUJD"));
        assert_eq!(split_data_url("QUJD"), (None, "QUJD"));
    }

    #[tokio::test]
    async fn test_default_instruction_and_mime() {
        let h = harness();
        h.adapter.push_text("Hello World\n");

        let response = handle(
            &h.ctx,
            &ImageRequest {
                image_base64: Some("iVBORw0KGgo=".into()),
                ..Default::default()
            },
        )
        .await;

        assert_eq!(response.status, 200);
        assert_eq!(response.body["tool"], TOOL_NAME);
        assert_eq!(response.body["text"], "Hello World");

        let prompt = h.adapter.last_prompt();
        assert_eq!(prompt.user, DEFAULT_INSTRUCTION);
        assert_eq!(prompt.images[0].data_url(), "data:image/png;base64,iVBORw0KGgo=");
    }

    #[tokio::test]
    async fn test_data_url_mime_and_custom_prompt() {
        let h = harness();
        h.adapter.push_text("a table");

        extract_text(
            &h.ctx,
            &ImageRequest {
                image_base64: Some("data:image/webp;base64,UklGRg==".into()),
                mime_type: None,
                prompt: Some("Describe the chart".into()),
            },
        )
        .await
        .unwrap();

        let prompt = h.adapter.last_prompt();
        assert_eq!(prompt.user, "Describe the chart");
        assert_eq!(prompt.images[0].mime_type, "image/webp");
        assert_eq!(prompt.images[0].base64_data, "UklGRg==");
    }

    #[tokio::test]
    async fn test_image_required() {
        let h = harness();
        assert_eq!(handle(&h.ctx, &ImageRequest::default()).await.status, 400);
        let empty_payload = ImageRequest {
            image_base64: Some("data:image/png;base64,".into()),
            ..Default::default()
        };
        assert_eq!(handle(&h.ctx, &empty_payload).await.status, 400);
    }
}
