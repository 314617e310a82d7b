//! PDF chat
//!
//! Stores text extracted from a user's PDF and answers questions strictly from
//! it. Every read of a stored document checks that the caller owns it.

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info};

use super::{ApiResponse, TaskContext, require};
use crate::ai::validation::strip_reasoning;
use crate::ai::{OutputShape, Prompt};
use crate::config::TaskKind;
use crate::constants::tasks::PDF_CONTEXT_MAX_CHARS;
use crate::types::{InsightError, PdfDocument, Result, truncate_chars};

const SYSTEM_PROMPT: &str =
    "You are an AI assistant. Answer strictly based on the provided PDF content. Use markdown formatting.";

pub fn pdf_prompt(pdf_text: &str, question: &str) -> Prompt {
    let context = truncate_chars(pdf_text, PDF_CONTEXT_MAX_CHARS);
    Prompt::user(format!("PDF Content:\n{}\n\nQuestion:\n{}", context, question)).with_system(SYSTEM_PROMPT)
}

/// Load a document the caller owns
fn owned_document(ctx: &TaskContext, pdf_id: i64, user_email: Option<&str>, denied: &str) -> Result<PdfDocument> {
    let document = ctx
        .store()
        .get_pdf(pdf_id)?
        .ok_or_else(|| InsightError::NotFound("PDF not found".to_string()))?;

    if user_email.map(str::trim) != Some(document.user_email.as_str()) {
        return Err(InsightError::Forbidden(denied.to_string()));
    }
    Ok(document)
}

pub fn add_pdf(
    ctx: &TaskContext,
    user_email: Option<&str>,
    file_name: Option<&str>,
    pdf_text: Option<&str>,
) -> Result<PdfDocument> {
    const MISSING: &str = "Email and PDF required";
    let user_email = require(user_email, MISSING)?;
    let file_name = require(file_name, MISSING)?;
    let pdf_text = require(pdf_text, MISSING)?;

    if !file_name.to_ascii_lowercase().ends_with(".pdf") {
        return Err(InsightError::invalid("Only PDF files allowed"));
    }

    let mut document = PdfDocument {
        id: None,
        user_email: user_email.to_string(),
        file_name: file_name.to_string(),
        pdf_text: pdf_text.to_string(),
        uploaded_at: Utc::now(),
    };
    document.id = Some(ctx.store().insert_pdf(&document)?);

    info!(file_name, chars = pdf_text.chars().count(), "PDF stored");
    Ok(document)
}

pub async fn ask(
    ctx: &TaskContext,
    pdf_id: Option<i64>,
    question: Option<&str>,
    user_email: Option<&str>,
) -> Result<String> {
    const MISSING: &str = "PDF ID and question required";
    let pdf_id = pdf_id.ok_or_else(|| InsightError::invalid(MISSING))?;
    let question = require(question, MISSING)?;

    let document = owned_document(ctx, pdf_id, user_email, "Unauthorized access")?;
    debug!(pdf_id, chars = document.pdf_text.len(), "Answering from PDF");

    let success = ctx
        .generate(TaskKind::PdfChat, pdf_prompt(&document.pdf_text, question), OutputShape::RawText)
        .await?;
    Ok(strip_reasoning(&success.payload.into_text()).trim().to_string())
}

/// Newest first
pub fn list(ctx: &TaskContext, user_email: Option<&str>) -> Result<Vec<PdfDocument>> {
    let user_email = require(user_email, "User email is required")?;
    ctx.store().list_pdfs(user_email)
}

pub fn delete(ctx: &TaskContext, pdf_id: i64, user_email: Option<&str>) -> Result<()> {
    owned_document(ctx, pdf_id, user_email, "Unauthorized")?;
    if !ctx.store().delete_pdf(pdf_id)? {
        return Err(InsightError::NotFound("PDF not found".to_string()));
    }
    Ok(())
}

/// `{success, message, pdf}`
pub fn handle_add(
    ctx: &TaskContext,
    user_email: Option<&str>,
    file_name: Option<&str>,
    pdf_text: Option<&str>,
) -> ApiResponse {
    ApiResponse::from_result(
        add_pdf(ctx, user_email, file_name, pdf_text).map(|pdf| {
            json!({
                "message": "PDF uploaded successfully",
                "pdf": pdf,
            })
        }),
    )
}

/// `{success, answer}`
pub async fn handle_ask(
    ctx: &TaskContext,
    pdf_id: Option<i64>,
    question: Option<&str>,
    user_email: Option<&str>,
) -> ApiResponse {
    ApiResponse::from_result(
        ask(ctx, pdf_id, question, user_email)
            .await
            .map(|answer| json!({ "answer": answer })),
    )
}

/// `{success, pdfs}`; text bodies are left out of the listing
pub fn handle_list(ctx: &TaskContext, user_email: Option<&str>) -> ApiResponse {
    ApiResponse::from_result(list(ctx, user_email).map(|pdfs| {
        let pdfs: Vec<_> = pdfs
            .into_iter()
            .map(|pdf| {
                json!({
                    "id": pdf.id,
                    "fileName": pdf.file_name,
                    "uploadedAt": pdf.uploaded_at,
                })
            })
            .collect();
        json!({ "pdfs": pdfs })
    }))
}

pub fn handle_delete(ctx: &TaskContext, pdf_id: i64, user_email: Option<&str>) -> ApiResponse {
    ApiResponse::from_result(
        delete(ctx, pdf_id, user_email).map(|()| json!({ "message": "PDF deleted successfully" })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::test_support::harness;

    const OWNER: &str = "owner@example.com";

    fn upload(ctx: &TaskContext) -> i64 {
        add_pdf(ctx, Some(OWNER), Some("notes.PDF"), Some("Borrowing rules: one mutable or many shared."))
            .unwrap()
            .id
            .unwrap()
    }

    #[test]
    fn test_prompt_caps_context() {
        let text = "x".repeat(PDF_CONTEXT_MAX_CHARS + 100);
        let prompt = pdf_prompt(&text, "q?");
        assert_eq!(prompt.system.as_deref(), Some(SYSTEM_PROMPT));
        assert_eq!(prompt.user.matches('x').count(), PDF_CONTEXT_MAX_CHARS);
        assert!(prompt.user.ends_with("\n\nQuestion:\nq?"));
    }

    #[test]
    fn test_add_validation() {
        let h = harness();
        assert_eq!(handle_add(&h.ctx, None, Some("a.pdf"), Some("t")).status, 400);
        let wrong_type = handle_add(&h.ctx, Some(OWNER), Some("a.docx"), Some("t"));
        assert_eq!(wrong_type.status, 400);
        assert_eq!(wrong_type.body["message"], "Only PDF files allowed");

        let ok = handle_add(&h.ctx, Some(OWNER), Some("a.pdf"), Some("text"));
        assert_eq!(ok.status, 200);
        assert_eq!(ok.body["message"], "PDF uploaded successfully");
        assert_eq!(ok.body["pdf"]["fileName"], "a.pdf");
    }

    #[tokio::test]
    async fn test_ask_owner_gets_answer() {
        let h = harness();
        let id = upload(&h.ctx);
        h.adapter.push_text("<think>check rules</think>\nOne mutable **or** many shared.");

        let response = handle_ask(&h.ctx, Some(id), Some("What are the rules?"), Some(OWNER)).await;

        assert_eq!(response.status, 200);
        assert_eq!(response.body["answer"], "One mutable **or** many shared.");
        let prompt = h.adapter.last_prompt();
        assert!(prompt.user.starts_with("PDF Content:\nBorrowing rules"));
        assert_eq!(h.adapter.sent()[0].0, "tngtech/deepseek-r1t2-chimera:free");
    }

    #[tokio::test]
    async fn test_ask_ownership_and_missing() {
        let h = harness();
        let id = upload(&h.ctx);

        assert_eq!(handle_ask(&h.ctx, Some(id), Some("q"), Some("intruder@example.com")).await.status, 403);
        assert_eq!(handle_ask(&h.ctx, Some(id), Some("q"), None).await.status, 403);
        assert_eq!(handle_ask(&h.ctx, Some(id + 100), Some("q"), Some(OWNER)).await.status, 404);
        assert_eq!(handle_ask(&h.ctx, None, Some("q"), Some(OWNER)).await.status, 400);
        assert!(h.adapter.sent().is_empty());
    }

    #[test]
    fn test_list_and_delete() {
        let h = harness();
        let id = upload(&h.ctx);

        let listed = handle_list(&h.ctx, Some(OWNER));
        assert_eq!(listed.body["pdfs"].as_array().unwrap().len(), 1);
        assert!(listed.body["pdfs"][0].get("pdfText").is_none());
        assert_eq!(handle_list(&h.ctx, None).status, 400);

        assert_eq!(handle_delete(&h.ctx, id, Some("intruder@example.com")).status, 403);
        let deleted = handle_delete(&h.ctx, id, Some(OWNER));
        assert_eq!(deleted.body["message"], "PDF deleted successfully");
        assert_eq!(handle_delete(&h.ctx, id, Some(OWNER)).status, 404);
        assert!(list(&h.ctx, Some(OWNER)).unwrap().is_empty());
    }
}
