//! Video lookup
//!
//! Topic enrichment searches the YouTube Data API; summaries may look up a
//! video title through oEmbed. Lookup failures never fail a task: search
//! degrades to an empty list and title lookup to `None`.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::ai::provider::Credential;
use crate::ai::timeout::with_timeout;
use crate::config::{CredentialStore, YoutubeConfig};
use crate::constants::youtube::OEMBED_URL;
use crate::types::{InsightError, Result, VideoRef, json_string};

#[async_trait]
pub trait VideoLookup: Send + Sync {
    /// Videos matching `query`; empty on any failure
    async fn search(&self, query: &str) -> Vec<VideoRef>;

    async fn video_title(&self, video_id: &str) -> Option<String>;
}

pub type SharedVideoLookup = Arc<dyn VideoLookup>;

static VIDEO_ID_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r#"(?:youtube\.com/(?:[^/]+/.+/|(?:v|e(?:mbed)?|shorts|live)/|.*[?&]v=)|youtu\.be/)([^"&?/\s]{11})"#,
    )
    .ok()
});

/// Eleven-character video id from watch, shorts, live, embed or youtu.be URLs
pub fn extract_video_id(url: &str) -> Option<String> {
    VIDEO_ID_RE
        .as_ref()?
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Read `items[].id.videoId` / `items[].snippet.title`, skipping non-video hits
pub fn parse_search_results(body: &Value) -> Vec<VideoRef> {
    body.get("items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let video_id = item.get("id").and_then(|id| json_string(id, "videoId"))?;
                    let title = item
                        .get("snippet")
                        .and_then(|s| json_string(s, "title"))
                        .unwrap_or_default();
                    Some(VideoRef { video_id, title })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// YouTube Data API search plus oEmbed title lookup
pub struct YoutubeClient {
    client: reqwest::Client,
    search_url: String,
    api_key: Option<Credential>,
    max_results: u32,
    timeout: Duration,
}

impl YoutubeClient {
    /// `None` when enrichment is disabled. A missing key keeps title lookup
    /// working while search returns nothing.
    pub fn from_config(config: &YoutubeConfig, credentials: &CredentialStore) -> Result<Option<Self>> {
        if !config.enabled {
            return Ok(None);
        }

        let api_key = credentials.get(&config.api_key_env).map(Credential::new);
        if api_key.is_none() {
            warn!("{} is not set; video search disabled", config.api_key_env);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| InsightError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Some(Self {
            client,
            search_url: config.api_base.clone(),
            api_key,
            max_results: config.max_results,
            timeout: Duration::from_secs(config.timeout_secs),
        }))
    }

    async fn fetch_search(&self, query: &str, key: &Credential) -> Result<Vec<VideoRef>> {
        let max_results = self.max_results.to_string();
        let url = Url::parse_with_params(
            &self.search_url,
            &[
                ("part", "snippet"),
                ("q", query),
                ("type", "video"),
                ("maxResults", max_results.as_str()),
                ("key", key.expose()),
            ],
        )
        .map_err(|e| InsightError::Lookup(format!("invalid search URL: {}", e)))?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| InsightError::Lookup(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(InsightError::Lookup(format!("YouTube search returned {}", status)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| InsightError::Lookup(e.to_string()))?;
        Ok(parse_search_results(&body))
    }

    async fn fetch_title(&self, video_id: &str) -> Result<Option<String>> {
        let watch_url = format!("https://www.youtube.com/watch?v={}", video_id);
        let url = Url::parse_with_params(OEMBED_URL, &[("url", watch_url.as_str()), ("format", "json")])
            .map_err(|e| InsightError::Lookup(format!("invalid oEmbed URL: {}", e)))?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| InsightError::Lookup(e.to_string()))?;
        if !response.status().is_success() {
            return Ok(None);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| InsightError::Lookup(e.to_string()))?;
        Ok(json_string(&body, "title").filter(|t| !t.trim().is_empty()))
    }
}

#[async_trait]
impl VideoLookup for YoutubeClient {
    async fn search(&self, query: &str) -> Vec<VideoRef> {
        let Some(key) = &self.api_key else {
            return Vec::new();
        };

        match with_timeout(self.timeout, self.fetch_search(query, key), "youtube search").await {
            Ok(videos) => {
                debug!(query, count = videos.len(), "YouTube search");
                videos
            }
            Err(e) => {
                warn!("YouTube search failed for '{}': {}", query, e);
                Vec::new()
            }
        }
    }

    async fn video_title(&self, video_id: &str) -> Option<String> {
        match with_timeout(self.timeout, self.fetch_title(video_id), "youtube oembed").await {
            Ok(title) => title,
            Err(e) => {
                warn!("oEmbed lookup failed for {}: {}", video_id, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_video_id_formats() {
        let id = Some("dQw4w9WgXcQ".to_string());
        assert_eq!(extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"), id);
        assert_eq!(extract_video_id("https://youtube.com/watch?feature=share&v=dQw4w9WgXcQ&t=10"), id);
        assert_eq!(extract_video_id("https://youtu.be/dQw4w9WgXcQ?si=abc"), id);
        assert_eq!(extract_video_id("https://www.youtube.com/shorts/dQw4w9WgXcQ"), id);
        assert_eq!(extract_video_id("https://www.youtube.com/embed/dQw4w9WgXcQ"), id);
        assert_eq!(extract_video_id("https://www.youtube.com/live/dQw4w9WgXcQ"), id);
    }

    #[test]
    fn test_extract_video_id_rejects_other_urls() {
        assert_eq!(extract_video_id("https://vimeo.com/123456789"), None);
        assert_eq!(extract_video_id("https://youtu.be/short"), None);
        assert_eq!(extract_video_id("not a url"), None);
    }

    #[test]
    fn test_parse_search_results_skips_channels() {
        let body = json!({
            "items": [
                {"id": {"kind": "youtube#video", "videoId": "abc123def45"}, "snippet": {"title": "Ownership"}},
                {"id": {"kind": "youtube#channel", "channelId": "UC1"}, "snippet": {"title": "Channel"}},
                {"id": {"videoId": "zzz123def45"}}
            ]
        });

        let videos = parse_search_results(&body);
        assert_eq!(videos.len(), 2);
        assert_eq!(videos[0].video_id, "abc123def45");
        assert_eq!(videos[0].title, "Ownership");
        assert_eq!(videos[1].title, "");
    }

    #[test]
    fn test_parse_search_results_error_body() {
        assert!(parse_search_results(&json!({"error": {"code": 403}})).is_empty());
    }

    #[test]
    fn test_disabled_config_builds_nothing() {
        let config = YoutubeConfig {
            enabled: false,
            ..Default::default()
        };
        let store = CredentialStore::from_map(Default::default());
        assert!(YoutubeClient::from_config(&config, &store).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_search_without_key_is_empty() {
        let store = CredentialStore::from_map(Default::default());
        let client = YoutubeClient::from_config(&YoutubeConfig::default(), &store)
            .unwrap()
            .unwrap();
        assert!(client.search("rust ownership").await.is_empty());
    }
}
