//! PDF Commands

use std::path::Path;

use crate::cli::util::{CommandContext, read_text};
use crate::tasks::{ApiResponse, pdf};
use crate::types::Result;

/// Store already-extracted text under `name`
pub fn add(ctx: &CommandContext, email: &str, name: &str, text_file: &Path) -> Result<ApiResponse> {
    let text = read_text(text_file)?;
    Ok(pdf::handle_add(&ctx.tasks, Some(email), Some(name), Some(&text)))
}

pub async fn ask(ctx: &CommandContext, id: i64, question: &str, email: &str) -> Result<ApiResponse> {
    Ok(pdf::handle_ask(&ctx.tasks, Some(id), Some(question), Some(email)).await)
}

pub fn list(ctx: &CommandContext, email: &str) -> Result<ApiResponse> {
    Ok(pdf::handle_list(&ctx.tasks, Some(email)))
}

pub fn delete(ctx: &CommandContext, id: i64, email: &str) -> Result<ApiResponse> {
    Ok(pdf::handle_delete(&ctx.tasks, id, Some(email)))
}
