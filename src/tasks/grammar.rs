//! Grammar correction

use serde::Serialize;
use serde_json::json;

use super::{ApiResponse, TaskContext, require};
use crate::ai::{OutputShape, Prompt};
use crate::ai::validation::strip_reasoning;
use crate::config::TaskKind;
use crate::constants::tasks::GRAMMAR_MAX_WORDS;
use crate::types::{Result, truncate_words};

const TOOL_NAME: &str = "OpenRouter Grammar Checker";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GrammarCorrection {
    /// Input after truncation
    pub original_text: String,
    pub corrected_text: String,
}

pub fn grammar_prompt(text: &str) -> Prompt {
    Prompt::user(format!(
        "Correct the grammar of the following text and return only the corrected version:\n\n\"{}\"",
        text
    ))
}

/// Surrounding quotes echoed back from the prompt are dropped
fn clean_correction(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .map(str::trim)
        .unwrap_or(trimmed)
}

pub async fn check_grammar(ctx: &TaskContext, text: Option<&str>) -> Result<GrammarCorrection> {
    let text = require(text, "Text is required")?;
    let original_text = truncate_words(text, GRAMMAR_MAX_WORDS);

    let success = ctx
        .generate(TaskKind::Grammar, grammar_prompt(&original_text), OutputShape::RawText)
        .await?;

    let raw = strip_reasoning(&success.payload.into_text());
    let corrected = clean_correction(&raw);
    let corrected_text = if corrected.is_empty() {
        original_text.clone()
    } else {
        corrected.to_string()
    };

    Ok(GrammarCorrection {
        original_text,
        corrected_text,
    })
}

/// `{success, tool, original_text, corrected_text}`
pub async fn handle(ctx: &TaskContext, text: Option<&str>) -> ApiResponse {
    ApiResponse::from_result(check_grammar(ctx, text).await.map(|c| {
        json!({
            "tool": TOOL_NAME,
            "original_text": c.original_text,
            "corrected_text": c.corrected_text,
        })
    }))
}
