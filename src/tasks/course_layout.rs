//! Course layout generation
//!
//! Turns the course form into a chapter outline, builds the banner image URL
//! and persists the course row.

use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{info, warn};

use super::image::prompt_url;
use super::{ApiResponse, TaskContext, require};
use crate::ai::{OutputShape, Prompt, PromptBuilder};
use crate::ai::validation::ExtractionError;
use crate::config::TaskKind;
use crate::types::{CourseId, CourseLayout, CourseRecord, InsightError, Result};

const LAYOUT_SCHEMA: &str = r#"{
  "course": {
    "name": "string",
    "description": "string",
    "category": "string",
    "level": "string",
    "duration": "string",
    "includeVideo": "boolean",
    "noOfChapters": "number",
    "bannerImagePrompt": "string",
    "chapters": [
      {
        "chapterName": "string",
        "duration": "string",
        "topics": ["string"]
      }
    ]
  }
}"#;

/// Course form submitted by the user
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutRequest {
    /// Generated when absent
    pub course_id: Option<String>,
    /// Owner; required
    pub email: Option<String>,
    /// Remaining form fields, passed to the model verbatim
    #[serde(flatten)]
    pub form: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct GeneratedLayout {
    pub course_id: CourseId,
    pub layout: CourseLayout,
    pub banner_image_url: Option<String>,
}

pub fn layout_prompt(form: &Map<String, Value>) -> Prompt {
    PromptBuilder::new()
        .role("Generate a learning course based on the user input.")
        .rules(vec![
            "Include name, description, category, level and duration",
            "Set includeVideo and noOfChapters from the user input when given",
            "Write a bannerImagePrompt describing a course cover illustration",
            "List every chapter with its topics",
        ])
        .schema(LAYOUT_SCHEMA)
        .section("User Input", &Value::Object(form.clone()).to_string())
        .into_prompt()
}

/// Pollinations URL for the layout's banner prompt, or a prompt built from
/// name, category and level when the model gave none.
pub fn banner_url(layout: &CourseLayout) -> Result<String> {
    let prompt = if layout.banner_image_prompt.trim().is_empty() {
        format!("{} {} {} course cover", layout.name, layout.category, layout.level)
    } else {
        layout.banner_image_prompt.clone()
    };

    Ok(prompt_url(&prompt)?.to_string())
}

pub async fn generate_layout(ctx: &TaskContext, request: &LayoutRequest) -> Result<GeneratedLayout> {
    let email = require(request.email.as_deref(), "Unauthorized")
        .map_err(|_| InsightError::Unauthorized("Unauthorized".to_string()))?;

    let course_id = request
        .course_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(CourseId::new)
        .unwrap_or_else(CourseId::generate);

    let success = ctx
        .generate(TaskKind::CourseLayout, layout_prompt(&request.form), OutputShape::JsonObject)
        .await?;
    let course_json = success.payload.into_json().unwrap_or(Value::Null);

    let layout = CourseLayout::from_value(&course_json).ok_or_else(|| {
        InsightError::Unparseable(ExtractionError::ParseFailed {
            reason: "course layout has no course name".to_string(),
        })
    })?;

    let banner_image_url = banner_url(&layout)
        .inspect_err(|e| warn!("Banner URL unavailable: {}", e))
        .ok();

    let record = CourseRecord::from_layout(
        course_id.as_str(),
        &layout,
        course_json,
        email,
        banner_image_url.clone(),
    );
    ctx.store().insert_course(&record)?;

    info!(
        course_id = %course_id,
        chapters = layout.chapters.len(),
        model = %success.model,
        "Course layout generated"
    );

    Ok(GeneratedLayout {
        course_id,
        layout,
        banner_image_url,
    })
}

/// `{success, courseId}`
pub async fn handle(ctx: &TaskContext, request: &LayoutRequest) -> ApiResponse {
    ApiResponse::from_result(
        generate_layout(ctx, request)
            .await
            .map(|generated| json!({ "courseId": generated.course_id.as_str() })),
    )
}
