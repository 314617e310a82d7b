//! Quiz generation and result history

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use super::{ApiResponse, TaskContext, require};
use crate::ai::validation::ExtractionError;
use crate::ai::{OutputShape, Prompt};
use crate::config::TaskKind;
use crate::constants::tasks::{DEFAULT_QUIZ_QUESTIONS, MAX_QUIZ_QUESTIONS};
use crate::types::{InsightError, QuizQuestion, QuizResult, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizRequest {
    pub topic: Option<String>,
    pub num_questions: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveResultRequest {
    pub user_email: Option<String>,
    pub topic: Option<String>,
    #[serde(default)]
    pub score: u32,
    #[serde(default)]
    pub total_questions: u32,
    /// Defaults to now
    pub date: Option<DateTime<Utc>>,
}

pub fn quiz_prompt(topic: &str, count: u32) -> Prompt {
    Prompt::user(format!(
        "Generate a quiz with exactly {count} multiple-choice questions about \"{topic}\" in JSON format:\n\
         [\n  {{\n    \"question\": \"...\",\n    \"options\": [\"A\", \"B\", \"C\", \"D\"],\n    \"answer\": \"...\"\n  }}\n]\n\
         Return pure JSON only. No markdown. No code fences."
    ))
}

pub async fn generate_quiz(ctx: &TaskContext, request: &QuizRequest) -> Result<Vec<QuizQuestion>> {
    let topic = require(request.topic.as_deref(), "Topic is required")?;
    let count = request.num_questions.unwrap_or(DEFAULT_QUIZ_QUESTIONS);
    if count == 0 || count > MAX_QUIZ_QUESTIONS {
        return Err(InsightError::invalid(format!(
            "numQuestions must be between 1 and {}",
            MAX_QUIZ_QUESTIONS
        )));
    }

    let success = ctx
        .generate(TaskKind::Quiz, quiz_prompt(topic, count), OutputShape::JsonArray)
        .await?;

    let questions: Vec<QuizQuestion> = success
        .payload
        .as_json()
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(QuizQuestion::from_value).collect())
        .unwrap_or_default();

    if questions.is_empty() {
        return Err(InsightError::Unparseable(ExtractionError::ParseFailed {
            reason: "quiz contains no usable questions".to_string(),
        }));
    }

    info!(topic, requested = count, generated = questions.len(), "Quiz generated");
    Ok(questions)
}

pub fn save_result(ctx: &TaskContext, request: &SaveResultRequest) -> Result<QuizResult> {
    const MISSING: &str = "Missing required fields";
    let user_email = require(request.user_email.as_deref(), MISSING)?;
    let topic = require(request.topic.as_deref(), MISSING)?;
    if request.score > request.total_questions {
        return Err(InsightError::invalid("score cannot exceed totalQuestions"));
    }

    let mut result = QuizResult {
        id: None,
        user_email: user_email.to_string(),
        topic: topic.to_string(),
        score: request.score,
        total_questions: request.total_questions,
        date: request.date.unwrap_or_else(Utc::now),
    };
    result.id = Some(ctx.store().save_quiz_result(&result)?);
    Ok(result)
}

/// Newest first
pub fn history(ctx: &TaskContext, user_email: Option<&str>) -> Result<Vec<QuizResult>> {
    let user_email = require(user_email, "Email is required")?;
    ctx.store().quiz_history(user_email)
}

/// `{success, quiz}`
pub async fn handle(ctx: &TaskContext, request: &QuizRequest) -> ApiResponse {
    ApiResponse::from_result(
        generate_quiz(ctx, request)
            .await
            .map(|quiz| json!({ "quiz": quiz })),
    )
}

/// `{success, result}`
pub fn handle_save(ctx: &TaskContext, request: &SaveResultRequest) -> ApiResponse {
    ApiResponse::from_result(save_result(ctx, request).map(|result| json!({ "result": result })))
}

/// `{success, history}`
pub fn handle_history(ctx: &TaskContext, user_email: Option<&str>) -> ApiResponse {
    ApiResponse::from_result(history(ctx, user_email).map(|history| json!({ "history": history })))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::tasks::test_support::harness;
    use crate::types::ErrorKind;

    const QUIZ_OUTPUT: &str = r#"```json
[
  {"question": "What moves ownership?", "options": ["Copy", "Assignment", "Borrow", "Clone"], "answer": "Assignment"},
  {"question": "", "options": ["x"], "answer": "x"},
  {"question": "Which type is Copy?", "options": ["String", "Vec", "i32", "Box"], "answer": "i32"},
]
```"#;

    #[test]
    fn test_prompt_mentions_count_and_topic() {
        let prompt = quiz_prompt("Rust ownership", 7);
        assert!(prompt.user.contains("exactly 7 multiple-choice questions about \"Rust ownership\""));
        assert!(prompt.user.contains("No code fences."));
    }

    #[tokio::test]
    async fn test_generate_filters_invalid_questions() {
        let h = harness();
        h.adapter.push_text(QUIZ_OUTPUT);

        let response = handle(
            &h.ctx,
            &QuizRequest {
                topic: Some("Rust ownership".into()),
                num_questions: None,
            },
        )
        .await;

        assert_eq!(response.status, 200);
        let quiz = response.body["quiz"].as_array().unwrap();
        assert_eq!(quiz.len(), 2);
        assert_eq!(quiz[1]["answer"], "i32");
        assert!(h.adapter.last_prompt().user.contains("exactly 5"));
    }

    #[tokio::test]
    async fn test_validation() {
        let h = harness();
        let missing = handle(&h.ctx, &QuizRequest::default()).await;
        assert_eq!(missing.status, 400);
        assert_eq!(missing.body["message"], "Topic is required");

        let too_many = QuizRequest {
            topic: Some("x".into()),
            num_questions: Some(500),
        };
        assert_eq!(handle(&h.ctx, &too_many).await.status, 400);
        assert!(h.adapter.sent().is_empty());
    }

    #[tokio::test]
    async fn test_empty_array_is_unparseable() {
        let h = harness();
        h.adapter.push_text("[]");
        let err = generate_quiz(
            &h.ctx,
            &QuizRequest {
                topic: Some("x".into()),
                num_questions: Some(3),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, InsightError::Unparseable(_)));
    }

    #[tokio::test]
    async fn test_overloaded_then_success() {
        let h = harness();
        h.adapter.push_failure(ErrorKind::Overloaded, "model is overloaded");
        h.adapter.push_text(r#"[{"question": "q", "options": ["a","b","c","d"], "answer": "a"}]"#);

        let quiz = generate_quiz(
            &h.ctx,
            &QuizRequest {
                topic: Some("x".into()),
                num_questions: Some(1),
            },
        )
        .await
        .unwrap();
        assert_eq!(quiz.len(), 1);
        assert_eq!(h.clock.sleeps().len(), 1);
    }

    #[test]
    fn test_save_and_history() {
        let h = harness();
        let day = |d| Utc.with_ymd_and_hms(2026, 3, d, 9, 0, 0).unwrap();

        for (score, d) in [(3, 1), (5, 2)] {
            let saved = save_result(
                &h.ctx,
                &SaveResultRequest {
                    user_email: Some("a@b.c".into()),
                    topic: Some("Rust".into()),
                    score,
                    total_questions: 5,
                    date: Some(day(d)),
                },
            )
            .unwrap();
            assert!(saved.id.is_some());
        }

        let response = handle_history(&h.ctx, Some("a@b.c"));
        assert_eq!(response.status, 200);
        let history = response.body["history"].as_array().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0]["score"], 5);
        assert_eq!(history[0]["totalQuestions"], 5);
    }

    #[test]
    fn test_save_validation() {
        let h = harness();
        assert_eq!(handle_save(&h.ctx, &SaveResultRequest::default()).status, 400);
        assert_eq!(handle_history(&h.ctx, Some(" ")).status, 400);

        let inflated = SaveResultRequest {
            user_email: Some("a@b.c".into()),
            topic: Some("Rust".into()),
            score: 9,
            total_questions: 5,
            date: None,
        };
        assert_eq!(handle_save(&h.ctx, &inflated).status, 400);
    }
}
