//! Image generation
//!
//! Renders a prompt through Pollinations. The image itself is not embedded in
//! the response: callers get the URL the image is served from, confirmed by
//! fetching it once, plus its content type.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use url::Url;

use super::{ApiResponse, TaskContext, require};
use crate::ai::timeout::with_timeout;
use crate::constants::banner;
use crate::types::{InsightError, Result};

pub const TOOL_NAME: &str = "Pollinations Image API";

const REQUEST_FAILED: &str = "Pollinations API request failed";

/// Pollinations URL rendering `prompt`, with the watermark disabled
pub fn prompt_url(prompt: &str) -> Result<Url> {
    let mut url = Url::parse(banner::PROMPT_URL)
        .map_err(|e| InsightError::Config(format!("Invalid image URL: {}", e)))?;
    url.path_segments_mut()
        .map_err(|_| InsightError::Config("Image URL cannot take path segments".to_string()))?
        .push(prompt);
    url.set_query(Some("nologo=true"));
    Ok(url)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedImage {
    pub content_type: String,
    pub size_bytes: usize,
}

#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchedImage>;
}

pub type SharedImageSource = Arc<dyn ImageSource>;

/// reqwest-backed Pollinations fetch
pub struct PollinationsClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl PollinationsClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| InsightError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, timeout })
    }

    async fn download(&self, url: &Url) -> Result<FetchedImage> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| InsightError::Lookup(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(InsightError::Lookup(format!("Pollinations returned {}", status)));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| InsightError::Lookup(e.without_url().to_string()))?;

        Ok(FetchedImage {
            content_type,
            size_bytes: bytes.len(),
        })
    }
}

#[async_trait]
impl ImageSource for PollinationsClient {
    async fn fetch(&self, url: &Url) -> Result<FetchedImage> {
        with_timeout(self.timeout, self.download(url), "pollinations image").await
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImage {
    pub image_url: String,
    pub content_type: String,
    pub caption: String,
}

pub async fn generate_image(ctx: &TaskContext, prompt: Option<&str>) -> Result<GeneratedImage> {
    let prompt = require(prompt, "Prompt is required")?;
    let source = ctx
        .images()
        .ok_or_else(|| InsightError::Config("Image generation is not configured".to_string()))?;

    let url = prompt_url(prompt)?;
    let fetched = source.fetch(&url).await.map_err(|e| {
        warn!("Image generation failed: {}", e);
        InsightError::Lookup(REQUEST_FAILED.to_string())
    })?;

    info!(
        content_type = %fetched.content_type,
        bytes = fetched.size_bytes,
        "Image generated"
    );
    Ok(GeneratedImage {
        image_url: url.to_string(),
        content_type: fetched.content_type,
        caption: prompt.to_string(),
    })
}

/// `{success, tool, output: {imageUrl, contentType, caption}}`
pub async fn handle(ctx: &TaskContext, prompt: Option<&str>) -> ApiResponse {
    ApiResponse::from_result(generate_image(ctx, prompt).await.map(|image| {
        json!({
            "tool": TOOL_NAME,
            "output": image,
        })
    }))
}
