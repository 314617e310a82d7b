//! ThinkBot chat: one Markdown answer per message

use serde_json::json;

use super::{ApiResponse, TaskContext, require};
use crate::ai::{OutputShape, Prompt, PromptBuilder};
use crate::config::TaskKind;
use crate::types::Result;

pub fn chat_prompt(message: &str) -> Prompt {
    PromptBuilder::new()
        .role(
            "You are a helpful AI assistant. Answer the user's question clearly and concisely.\n\
             Use Markdown formatting to structure your response.",
        )
        .rules(vec![
            "Use paragraphs for explanations",
            "Use bullet points or numbered lists where appropriate",
            "Use tables for comparisons or structured data",
            "Use code blocks for code snippets",
        ])
        .section("Question", message)
        .into_prompt()
}

pub async fn answer(ctx: &TaskContext, message: Option<&str>) -> Result<String> {
    let message = require(message, "Message is required")?;
    let success = ctx
        .generate(TaskKind::Chat, chat_prompt(message), OutputShape::RawText)
        .await?;
    Ok(success.payload.into_text().trim().to_string())
}

/// `{success, data: {answer}}`
pub async fn handle(ctx: &TaskContext, message: Option<&str>) -> ApiResponse {
    ApiResponse::from_result(
        answer(ctx, message)
            .await
            .map(|answer| json!({ "data": { "answer": answer } })),
    )
}
