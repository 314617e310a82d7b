//! Generation Commands
//!
//! Each command runs one task and returns the envelope the web app would
//! receive. Inputs that the web app posts as JSON come from flags or files.

use std::path::PathBuf;

use serde_json::{Map, Value};
use tracing::warn;

use crate::ai::CircuitState;
use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, read_text};
use crate::tasks::course_content::{self, ContentRequest};
use crate::tasks::course_layout::{self, LayoutRequest};
use crate::tasks::courses::{self, ALL_GENERATED, CourseQuery};
use crate::tasks::image_to_text::{self, ImageRequest};
use crate::tasks::quiz::{self, QuizRequest, SaveResultRequest};
use crate::tasks::summarize::{self, SummarizeRequest};
use crate::tasks::{ApiResponse, chat, grammar, image};
use crate::types::{InsightError, Result};

#[derive(Debug, Default)]
pub struct LayoutArgs {
    pub email: Option<String>,
    pub course_id: Option<String>,
    /// JSON object merged under the flag values
    pub form: Option<PathBuf>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub level: Option<String>,
    pub chapters: Option<u32>,
    pub include_video: bool,
}

impl LayoutArgs {
    fn into_request(self) -> Result<LayoutRequest> {
        let mut form = match &self.form {
            Some(path) => match serde_json::from_str::<Value>(&read_text(path)?)? {
                Value::Object(map) => map,
                _ => {
                    return Err(InsightError::invalid(format!(
                        "{} must contain a JSON object",
                        path.display()
                    )));
                }
            },
            None => Map::new(),
        };

        let text_fields = [
            ("name", self.name),
            ("description", self.description),
            ("category", self.category),
            ("level", self.level),
        ];
        for (key, value) in text_fields {
            if let Some(value) = value {
                form.insert(key.to_string(), Value::String(value));
            }
        }
        if let Some(chapters) = self.chapters {
            form.insert("noOfChapters".to_string(), Value::from(chapters));
        }
        if self.include_video {
            form.insert("includeVideo".to_string(), Value::Bool(true));
        }

        // email and courseId inside the form file take effect unless flags override
        let email = self
            .email
            .or_else(|| form.remove("email").and_then(|v| v.as_str().map(String::from)));
        let course_id = self
            .course_id
            .or_else(|| form.remove("courseId").and_then(|v| v.as_str().map(String::from)));

        Ok(LayoutRequest {
            course_id,
            email,
            form,
        })
    }
}

#[derive(Debug, Default)]
pub struct SummarizeArgs {
    pub url: Option<String>,
    pub title: Option<String>,
    pub keywords: Option<String>,
    pub description: Option<String>,
    pub transcript: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct CoursesArgs {
    pub generated: bool,
    pub search: Option<String>,
    pub email: Option<String>,
    pub id: Option<String>,
}

impl CoursesArgs {
    fn into_query(self) -> CourseQuery {
        let course_id = if self.generated {
            Some(ALL_GENERATED.to_string())
        } else {
            self.id
        };
        CourseQuery {
            course_id,
            user_email: self.email,
            search: self.search,
        }
    }
}

/// Report breakers left open by this run
fn report_breakers(ctx: &CommandContext) {
    let stats = ctx.tasks.client().breaker_stats();
    let tripped: Vec<_> = stats.iter().filter(|s| s.state != CircuitState::Closed).collect();
    if tripped.is_empty() {
        return;
    }
    warn!(count = tripped.len(), "Quota breakers not closed");
    let out = Output::new();
    for stats in tripped {
        out.breaker(stats);
    }
}

fn finish(ctx: &CommandContext, response: ApiResponse) -> ApiResponse {
    report_breakers(ctx);
    response
}

pub async fn layout(ctx: &CommandContext, args: LayoutArgs) -> Result<ApiResponse> {
    let request = args.into_request()?;
    Ok(finish(ctx, course_layout::handle(&ctx.tasks, &request).await))
}

/// Generate content for a stored course, or print what is stored with `fetch`
pub async fn content(
    ctx: &CommandContext,
    course_id: &str,
    chapter: Option<usize>,
    include_video: Option<bool>,
    fetch: bool,
) -> Result<ApiResponse> {
    if fetch {
        return Ok(course_content::handle_fetch(&ctx.tasks, Some(course_id)));
    }

    let Some(course) = ctx.tasks.store().get_course(course_id)? else {
        return Ok(ApiResponse::from_error(&InsightError::NotFound(
            "Course not found".to_string(),
        )));
    };

    let request = ContentRequest {
        course_id: Some(course.cid),
        course_title: Some(course.name),
        course_json: Some(course.course_json),
        include_video,
        chapter_index: chapter,
    };
    Ok(finish(ctx, course_content::handle(&ctx.tasks, &request).await))
}

pub async fn quiz(ctx: &CommandContext, topic: String, count: Option<u32>) -> Result<ApiResponse> {
    let request = QuizRequest {
        topic: Some(topic),
        num_questions: count,
    };
    Ok(finish(ctx, quiz::handle(&ctx.tasks, &request).await))
}

pub fn quiz_history(ctx: &CommandContext, email: &str) -> Result<ApiResponse> {
    Ok(quiz::handle_history(&ctx.tasks, Some(email)))
}

pub fn quiz_result(ctx: &CommandContext, email: String, topic: String, score: u32, total: u32) -> Result<ApiResponse> {
    let request = SaveResultRequest {
        user_email: Some(email),
        topic: Some(topic),
        score,
        total_questions: total,
        date: None,
    };
    Ok(quiz::handle_save(&ctx.tasks, &request))
}

/// Text from the argument, or from `file` when given
fn text_input(text: Option<String>, file: Option<PathBuf>) -> Result<Option<String>> {
    match file {
        Some(path) => read_text(&path).map(Some),
        None => Ok(text),
    }
}

pub async fn grammar(ctx: &CommandContext, text: Option<String>, file: Option<PathBuf>) -> Result<ApiResponse> {
    let text = text_input(text, file)?;
    Ok(finish(ctx, grammar::handle(&ctx.tasks, text.as_deref()).await))
}

pub async fn chat(ctx: &CommandContext, message: String) -> Result<ApiResponse> {
    Ok(finish(ctx, chat::handle(&ctx.tasks, Some(message.as_str())).await))
}

pub async fn summarize(ctx: &CommandContext, args: SummarizeArgs) -> Result<ApiResponse> {
    let transcript = args.transcript.as_deref().map(read_text).transpose()?;
    let request = SummarizeRequest {
        video_url: args.url,
        title: args.title,
        keywords: args.keywords,
        description: args.description,
        transcript,
    };
    Ok(finish(ctx, summarize::handle(&ctx.tasks, &request).await))
}

/// `image` holds base64 text or a `data:` URL
pub async fn ocr(
    ctx: &CommandContext,
    image: PathBuf,
    mime_type: Option<String>,
    prompt: Option<String>,
) -> Result<ApiResponse> {
    let encoded: String = read_text(&image)?.split_whitespace().collect();
    let request = ImageRequest {
        image_base64: Some(encoded),
        mime_type,
        prompt,
    };
    Ok(finish(ctx, image_to_text::handle(&ctx.tasks, &request).await))
}

pub async fn image(ctx: &CommandContext, prompt: String) -> Result<ApiResponse> {
    Ok(image::handle(&ctx.tasks, Some(prompt.as_str())).await)
}

pub fn courses(ctx: &CommandContext, args: CoursesArgs) -> Result<ApiResponse> {
    Ok(courses::handle(&ctx.tasks, &args.into_query()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_layout_args_flags_override_form_file() {
        let dir = TempDir::new().unwrap();
        let form = dir.path().join("form.json");
        std::fs::write(
            &form,
            r#"{"name": "From file", "level": "Advanced", "email": "file@example.com", "courseId": "c9"}"#,
        )
        .unwrap();

        let request = LayoutArgs {
            form: Some(form),
            name: Some("From flag".into()),
            chapters: Some(4),
            include_video: true,
            ..Default::default()
        }
        .into_request()
        .unwrap();

        assert_eq!(request.form["name"], "From flag");
        assert_eq!(request.form["level"], "Advanced");
        assert_eq!(request.form["noOfChapters"], 4);
        assert_eq!(request.form["includeVideo"], true);
        assert_eq!(request.email.as_deref(), Some("file@example.com"));
        assert_eq!(request.course_id.as_deref(), Some("c9"));
        assert!(!request.form.contains_key("email"));
    }

    #[test]
    fn test_layout_args_rejects_non_object_form() {
        let dir = TempDir::new().unwrap();
        let form = dir.path().join("form.json");
        std::fs::write(&form, "[1, 2]").unwrap();

        let err = LayoutArgs {
            form: Some(form),
            ..Default::default()
        }
        .into_request()
        .unwrap_err();
        assert!(matches!(err, InsightError::InvalidRequest(_)));
    }

    #[test]
    fn test_courses_args_generated_flag_selects_catalog() {
        let query = CoursesArgs {
            generated: true,
            search: Some("rust".into()),
            ..Default::default()
        }
        .into_query();
        assert_eq!(query.course_id.as_deref(), Some(ALL_GENERATED));
        assert_eq!(query.search.as_deref(), Some("rust"));

        let query = CoursesArgs {
            email: Some("a@example.com".into()),
            ..Default::default()
        }
        .into_query();
        assert_eq!(query.course_id, None);
        assert_eq!(query.user_email.as_deref(), Some("a@example.com"));
    }

    #[test]
    fn test_text_input_prefers_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("in.txt");
        std::fs::write(&file, "from file").unwrap();

        assert_eq!(
            text_input(Some("arg".into()), Some(file)).unwrap().as_deref(),
            Some("from file")
        );
        assert_eq!(text_input(Some("arg".into()), None).unwrap().as_deref(), Some("arg"));
    }
}
