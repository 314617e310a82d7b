pub mod course;
pub mod error;
pub mod utils;

pub use course::{
    ChapterContent, ChapterOutline, CourseLayout, CourseRecord, PdfDocument, QuizQuestion,
    QuizResult, VideoRef,
};
pub use error::{
    ErrorClassifier, ErrorKind, InsightError, ProviderFailure, Result, ResultExt,
    parse_duration_secs, parse_retry_after,
};
pub use utils::{
    json_bool, json_string, json_string_array, json_string_or, json_u64, truncate_chars,
    truncate_words,
};

// =============================================================================
// Domain Newtypes
// =============================================================================

use std::fmt;

/// Type-safe wrapper for course IDs
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CourseId(String);

impl CourseId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random identifier
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for CourseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for CourseId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CourseId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for CourseId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
