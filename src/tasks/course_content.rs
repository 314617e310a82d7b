//! Course content generation
//!
//! Generates Markdown content chapter by chapter for a stored course. A
//! single chapter can be regenerated in place; a full run walks every chapter
//! sequentially with a fixed delay and records failed chapters as error
//! entries instead of aborting.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::{ApiResponse, TaskContext, require};
use crate::ai::{OutputShape, Prompt, PromptBuilder};
use crate::config::TaskKind;
use crate::types::{ChapterContent, InsightError, Result, json_string_or};

const CHAPTER_SCHEMA: &str = r#"{
  "chapterName": "Chapter Name",
  "topics": [
    {
      "topic": "Topic Name",
      "content": "Markdown explanation of the topic"
    }
  ]
}"#;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRequest {
    pub course_id: Option<String>,
    pub course_title: Option<String>,
    /// Course layout; may arrive as a JSON string and may be wrapped in `course`
    pub course_json: Option<Value>,
    /// Falls back to the stored course setting
    pub include_video: Option<bool>,
    /// Regenerate only this chapter
    pub chapter_index: Option<usize>,
}

/// Normalize `courseJson` into its chapter list
pub fn chapters_of(course_json: &Value) -> Result<Vec<Value>> {
    let parsed;
    let value = match course_json {
        Value::String(raw) => {
            parsed = serde_json::from_str::<Value>(raw)
                .map_err(|e| InsightError::invalid(format!("Invalid courseJson: {}", e)))?;
            &parsed
        }
        other => other,
    };
    let course = value.get("course").unwrap_or(value);

    course
        .get("chapters")
        .and_then(Value::as_array)
        .cloned()
        .ok_or_else(|| InsightError::invalid("Invalid chapters array"))
}

pub fn chapter_prompt(chapter: &Value) -> Prompt {
    PromptBuilder::new()
        .role("You generate strictly valid JSON educational content.")
        .rules(vec![
            "The content field MUST be Markdown: headings, lists, tables and fenced code with language labels",
            "Start each topic with a plain definition, then explain it in technical terms",
            "Use \\n for line breaks inside content strings, never literal newlines",
            "Generate content for EVERY topic in the chapter data",
            "No text outside the JSON",
        ])
        .schema(CHAPTER_SCHEMA)
        .section("Chapter data", &chapter.to_string())
        .into_prompt()
}

fn chapter_name(chapter: &Value) -> String {
    json_string_or(chapter, "chapterName", "Untitled chapter")
}

/// Generate one chapter and attach videos to its topics
async fn generate_chapter(ctx: &TaskContext, chapter: &Value, include_video: bool) -> Result<Value> {
    let success = ctx
        .generate(TaskKind::CourseContent, chapter_prompt(chapter), OutputShape::JsonObject)
        .await?;
    let mut content = success.payload.into_json().unwrap_or(Value::Null);

    let lookup = if include_video { ctx.videos() } else { None };
    if let Some(topics) = content.get_mut("topics").and_then(Value::as_array_mut) {
        for topic in topics.iter_mut() {
            let videos = match lookup {
                Some(lookup) => {
                    let query = json_string_or(topic, "topic", "");
                    if query.is_empty() {
                        Vec::new()
                    } else {
                        lookup.search(&query).await
                    }
                }
                None => Vec::new(),
            };
            if let Some(obj) = topic.as_object_mut() {
                obj.insert("youtubeVideos".to_string(), serde_json::to_value(videos)?);
            }
        }
    }

    Ok(content)
}

/// Generate content and store it on the course. Returns `{courseName, CourseContent}`.
pub async fn generate_content(ctx: &TaskContext, request: &ContentRequest) -> Result<Value> {
    const MISSING: &str = "Missing courseId, courseJson, or courseTitle";
    let course_id = require(request.course_id.as_deref(), MISSING)?;
    let course_title = require(request.course_title.as_deref(), MISSING)?;
    let course_json = request
        .course_json
        .as_ref()
        .filter(|v| !v.is_null())
        .ok_or_else(|| InsightError::invalid(MISSING))?;

    let chapters = chapters_of(course_json)?;

    let record = ctx
        .store()
        .get_course(course_id)?
        .ok_or_else(|| InsightError::NotFound("Course not found".to_string()))?;
    let include_video = request.include_video.unwrap_or(record.include_video);

    let content = match request.chapter_index {
        Some(index) => {
            let chapter = chapters.get(index).ok_or_else(|| {
                InsightError::invalid(format!(
                    "chapterIndex {} out of range ({} chapters)",
                    index,
                    chapters.len()
                ))
            })?;

            let generated = generate_chapter(ctx, chapter, include_video).await?;

            let mut existing = record
                .course_content
                .and_then(|v| v.as_array().cloned())
                .unwrap_or_default();
            if existing.len() <= index {
                existing.resize(index + 1, Value::Null);
            }
            existing[index] = generated;
            debug!(course_id, index, "Merged regenerated chapter");
            existing
        }
        None => {
            let delay = Duration::from_millis(ctx.config().generation.chapter_delay_ms);
            let mut entries = Vec::with_capacity(chapters.len());

            for (i, chapter) in chapters.iter().enumerate() {
                if i > 0 {
                    ctx.clock().sleep(delay).await;
                }
                let entry = match generate_chapter(ctx, chapter, include_video).await {
                    Ok(value) => ChapterContent::Generated(value),
                    Err(e) => {
                        warn!("Chapter {} of {} failed: {}", i + 1, course_id, e);
                        ChapterContent::Failed {
                            chapter: chapter_name(chapter),
                            message: e.to_string(),
                        }
                    }
                };
                entries.push(entry.to_value());
            }

            let failed = entries.iter().filter(|e| e.get("error").is_some()).count();
            info!(course_id, chapters = entries.len(), failed, "Course content generated");
            entries
        }
    };

    let content = Value::Array(content);
    ctx.store().update_course_content(course_id, &content)?;

    Ok(json!({
        "courseName": course_title,
        "CourseContent": content,
    }))
}

/// Stored content for a course
pub fn fetch_content(ctx: &TaskContext, course_id: Option<&str>) -> Result<Value> {
    let course_id = require(course_id, "courseId is required")?;
    let record = ctx
        .store()
        .get_course(course_id)?
        .ok_or_else(|| InsightError::NotFound("Course not found".to_string()))?;

    Ok(json!({
        "courseName": record.name,
        "CourseContent": record.course_content.unwrap_or_else(|| json!([])),
    }))
}

pub async fn handle(ctx: &TaskContext, request: &ContentRequest) -> ApiResponse {
    ApiResponse::from_result(generate_content(ctx, request).await)
}

pub fn handle_fetch(ctx: &TaskContext, course_id: Option<&str>) -> ApiResponse {
    ApiResponse::from_result(fetch_content(ctx, course_id))
}
