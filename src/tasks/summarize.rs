//! YouTube video summaries
//!
//! Video metadata (title, keywords, description, transcript) is supplied by
//! the caller. When no title is given and a [`VideoLookup`](super::VideoLookup)
//! is configured, the title is looked up by video id.

use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{ApiResponse, TaskContext, extract_video_id, require};
use crate::ai::{OutputShape, Prompt, PromptBuilder};
use crate::config::TaskKind;
use crate::constants::tasks::SUMMARY_MAX_CHARS;
use crate::types::{InsightError, Result, truncate_chars};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeRequest {
    pub video_url: Option<String>,
    pub title: Option<String>,
    pub keywords: Option<String>,
    pub description: Option<String>,
    pub transcript: Option<String>,
}

fn system_prompt() -> String {
    PromptBuilder::new()
        .role(
            "You are an expert YouTube video analyst and technical content writer. \
             Write a detailed, in-depth, professional knowledge report of the provided video content.",
        )
        .rules(vec![
            "Be extensive and detailed; prefer more information over brevity",
            "Use clear section headings, bullet points, numbered lists and tables where helpful",
            "For technical content include code blocks, examples and step-by-step explanations",
            "Separate multiple topics clearly",
            "Write as a knowledge report, never as \"this video discusses\"",
            "Without a transcript, infer from title, description and keywords and still write a long report",
        ])
        .section(
            "Output format (Markdown, in this order)",
            "### Video Overview\n\
             ### Key Concepts Explained\n\
             ### Detailed Breakdown\n\
             ### Tables / Structured Data (if applicable)\n\
             ### Code Examples (if applicable)\n\
             ### Practical Takeaways",
        )
        .build()
}

fn non_blank(value: Option<&str>) -> &str {
    value.map(str::trim).unwrap_or_default()
}

/// Prompt body from video metadata, capped at the summary context limit
pub fn video_context(title: &str, keywords: &str, description: &str, transcript: &str) -> String {
    let transcript = if transcript.is_empty() {
        "No transcript available"
    } else {
        transcript
    };
    let full = format!(
        "VIDEO TITLE: {}\nKEYWORDS: {}\nVIDEO DESCRIPTION: {}\nTRANSCRIPT: {}",
        title, keywords, description, transcript
    );
    truncate_chars(full.trim(), SUMMARY_MAX_CHARS).to_string()
}

pub async fn summarize(ctx: &TaskContext, request: &SummarizeRequest) -> Result<String> {
    let video_url = require(request.video_url.as_deref(), "Video URL required")?;
    let video_id = extract_video_id(video_url).ok_or_else(|| InsightError::invalid("Invalid YouTube URL"))?;

    let mut title = non_blank(request.title.as_deref()).to_string();
    if title.is_empty()
        && let Some(lookup) = ctx.videos()
        && let Some(found) = lookup.video_title(&video_id).await
    {
        debug!(video_id, "Title resolved through lookup");
        title = found;
    }

    let transcript = non_blank(request.transcript.as_deref());
    if title.is_empty() && transcript.is_empty() {
        return Err(InsightError::Lookup(
            "YouTube metadata unavailable for this video.".to_string(),
        ));
    }

    let context = video_context(
        &title,
        non_blank(request.keywords.as_deref()),
        non_blank(request.description.as_deref()),
        transcript,
    );
    let prompt = Prompt::user(context).with_system(system_prompt());

    let success = ctx
        .generate(TaskKind::Summarize, prompt, OutputShape::RawText)
        .await?;
    Ok(success.payload.into_text().trim().to_string())
}

/// `{success, summary}`
pub async fn handle(ctx: &TaskContext, request: &SummarizeRequest) -> ApiResponse {
    ApiResponse::from_result(
        summarize(ctx, request)
            .await
            .map(|summary| json!({ "summary": summary })),
    )
}
