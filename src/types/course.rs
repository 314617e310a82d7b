//! Course, chapter and quiz domain types
//!
//! Model output is loosely typed, so these are read leniently from
//! `serde_json::Value` rather than derived with strict deserialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::utils::{json_bool, json_string, json_string_array, json_string_or, json_u64};

/// Chapter entry of a generated course outline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChapterOutline {
    pub chapter_name: String,
    pub duration: String,
    pub topics: Vec<String>,
}

impl ChapterOutline {
    pub fn from_value(value: &Value) -> Self {
        Self {
            chapter_name: json_string_or(value, "chapterName", "Untitled chapter"),
            duration: json_string_or(value, "duration", ""),
            topics: json_string_array(value, "topics"),
        }
    }
}

/// Generated course outline (the `course` object of a layout response)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CourseLayout {
    pub name: String,
    pub description: String,
    pub category: String,
    pub level: String,
    pub duration: String,
    pub include_video: bool,
    pub no_of_chapters: u32,
    pub banner_image_prompt: String,
    pub chapters: Vec<ChapterOutline>,
}

impl CourseLayout {
    /// Read a layout from either `{"course": {...}}` or the bare course object.
    /// Returns `None` when no course name is present.
    pub fn from_value(value: &Value) -> Option<Self> {
        let course = value.get("course").unwrap_or(value);
        let name = json_string(course, "name")?;

        let chapters: Vec<ChapterOutline> = course
            .get("chapters")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().map(ChapterOutline::from_value).collect())
            .unwrap_or_default();

        let declared = json_u64(course, "noOfChapters", chapters.len() as u64);

        Some(Self {
            name,
            description: json_string_or(course, "description", ""),
            category: json_string_or(course, "category", ""),
            level: json_string_or(course, "level", ""),
            duration: json_string_or(course, "duration", ""),
            include_video: json_bool(course, "includeVideo", false),
            no_of_chapters: u32::try_from(declared).unwrap_or(u32::MAX),
            banner_image_prompt: json_string_or(course, "bannerImagePrompt", ""),
            chapters,
        })
    }
}

/// YouTube reference attached to a topic
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VideoRef {
    pub video_id: String,
    pub title: String,
}

/// Content generated for one chapter, or the error entry recorded in its place
#[derive(Debug, Clone, PartialEq)]
pub enum ChapterContent {
    Generated(Value),
    Failed { chapter: String, message: String },
}

impl ChapterContent {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Generated(value) => value.clone(),
            Self::Failed { chapter, message } => json!({
                "error": true,
                "chapter": chapter,
                "message": message,
            }),
        }
    }
}

/// Persisted course row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CourseRecord {
    pub cid: String,
    pub name: String,
    pub description: String,
    pub no_of_chapters: u32,
    pub include_video: bool,
    pub level: String,
    pub category: String,
    pub course_json: Value,
    pub user_email: String,
    pub banner_image_url: Option<String>,
    pub course_content: Option<Value>,
}

impl CourseRecord {
    pub fn from_layout(
        cid: impl Into<String>,
        layout: &CourseLayout,
        course_json: Value,
        user_email: impl Into<String>,
        banner_image_url: Option<String>,
    ) -> Self {
        Self {
            cid: cid.into(),
            name: layout.name.clone(),
            description: layout.description.clone(),
            no_of_chapters: layout.no_of_chapters,
            include_video: layout.include_video,
            level: layout.level.clone(),
            category: layout.category.clone(),
            course_json,
            user_email: user_email.into(),
            banner_image_url,
            course_content: None,
        }
    }
}

/// One generated multiple-choice question
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub answer: String,
}

impl QuizQuestion {
    /// Read a question, rejecting entries without text or options
    pub fn from_value(value: &Value) -> Option<Self> {
        let question = json_string(value, "question")?;
        let options = json_string_array(value, "options");
        if question.trim().is_empty() || options.is_empty() {
            return None;
        }
        Some(Self {
            question,
            answer: json_string_or(value, "answer", ""),
            options,
        })
    }
}

/// Saved quiz attempt
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuizResult {
    pub id: Option<i64>,
    pub user_email: String,
    pub topic: String,
    pub score: u32,
    pub total_questions: u32,
    pub date: DateTime<Utc>,
}

/// Uploaded PDF with its extracted text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PdfDocument {
    pub id: Option<i64>,
    pub user_email: String,
    pub file_name: String,
    pub pdf_text: String,
    pub uploaded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_from_wrapped_value() {
        let value = json!({
            "course": {
                "name": "Rust Basics",
                "description": "Intro",
                "level": "Beginner",
                "includeVideo": "Yes",
                "noOfChapters": "2",
                "chapters": [
                    {"chapterName": "Ownership", "duration": "1h", "topics": ["Moves", "Borrows"]},
                    {"chapterName": "Traits", "topics": ["Generics"]}
                ]
            }
        });

        let layout = CourseLayout::from_value(&value).unwrap();
        assert_eq!(layout.name, "Rust Basics");
        assert!(layout.include_video);
        assert_eq!(layout.no_of_chapters, 2);
        assert_eq!(layout.chapters[0].topics, vec!["Moves", "Borrows"]);
        assert_eq!(layout.chapters[1].duration, "");
    }

    #[test]
    fn test_layout_requires_name() {
        assert!(CourseLayout::from_value(&json!({"course": {"chapters": []}})).is_none());
    }

    #[test]
    fn test_failed_chapter_entry() {
        let failed = ChapterContent::Failed {
            chapter: "Traits".into(),
            message: "quota".into(),
        };
        assert!(failed.is_failed());
        assert_eq!(
            failed.to_value(),
            json!({"error": true, "chapter": "Traits", "message": "quota"})
        );
    }

    #[test]
    fn test_quiz_question_rejects_empty() {
        assert!(QuizQuestion::from_value(&json!({"question": "Q?", "options": []})).is_none());
        let q = QuizQuestion::from_value(&json!({
            "question": "2+2?",
            "options": ["3", "4", "5", "6"],
            "answer": "4"
        }))
        .unwrap();
        assert_eq!(q.answer, "4");
    }
}
