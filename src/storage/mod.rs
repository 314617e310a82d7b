//! Persistence
//!
//! Generation tasks persist through the [`ContentStore`] trait; [`Database`]
//! implements it on SQLite.

pub mod database;

pub use database::{Database, PoolConfig, SharedDatabase};

use std::sync::Arc;

use serde_json::Value;

use crate::types::{CourseRecord, PdfDocument, QuizResult, Result};

/// Storage collaborator for generated content
pub trait ContentStore: Send + Sync {
    fn insert_course(&self, course: &CourseRecord) -> Result<()>;
    fn get_course(&self, cid: &str) -> Result<Option<CourseRecord>>;
    fn list_courses(&self, user_email: &str) -> Result<Vec<CourseRecord>>;
    /// Courses whose chapter content has been generated, newest first
    fn list_generated_courses(&self) -> Result<Vec<CourseRecord>>;
    /// Fails with `NotFound` when the course does not exist
    fn update_course_content(&self, cid: &str, content: &Value) -> Result<()>;

    fn save_quiz_result(&self, result: &QuizResult) -> Result<i64>;
    /// Newest first
    fn quiz_history(&self, user_email: &str) -> Result<Vec<QuizResult>>;

    fn insert_pdf(&self, document: &PdfDocument) -> Result<i64>;
    fn get_pdf(&self, id: i64) -> Result<Option<PdfDocument>>;
    /// Newest first
    fn list_pdfs(&self, user_email: &str) -> Result<Vec<PdfDocument>>;
    /// Returns whether a row was removed
    fn delete_pdf(&self, id: i64) -> Result<bool>;
}

pub type SharedStore = Arc<dyn ContentStore>;
