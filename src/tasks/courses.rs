//! Course listing
//!
//! Course id `"0"` lists every course with generated content, optionally
//! narrowed by a case-insensitive name search. Any other id loads that single
//! course; without an id the owner's courses are listed.

use serde_json::json;
use tracing::debug;

use super::{ApiResponse, TaskContext, require};
use crate::types::{CourseRecord, InsightError, Result};

/// Course id selecting the catalog of generated courses
pub const ALL_GENERATED: &str = "0";

#[derive(Debug, Clone, Default)]
pub struct CourseQuery {
    pub course_id: Option<String>,
    pub user_email: Option<String>,
    pub search: Option<String>,
}

/// Result of a listing query
#[derive(Debug, Clone, PartialEq)]
pub enum CourseListing {
    One(CourseRecord),
    Many(Vec<CourseRecord>),
}

fn matches_search(course: &CourseRecord, needle: &str) -> bool {
    course.name.to_lowercase().contains(needle)
}

pub fn list(ctx: &TaskContext, query: &CourseQuery) -> Result<CourseListing> {
    let course_id = query.course_id.as_deref().map(str::trim).filter(|id| !id.is_empty());

    match course_id {
        Some(ALL_GENERATED) => {
            let mut courses = ctx.store().list_generated_courses()?;
            let needle = query
                .search
                .as_deref()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty());
            if let Some(needle) = needle {
                courses.retain(|course| matches_search(course, &needle));
            }
            debug!(count = courses.len(), "Listed generated courses");
            Ok(CourseListing::Many(courses))
        }
        Some(cid) => ctx
            .store()
            .get_course(cid)?
            .map(CourseListing::One)
            .ok_or_else(|| InsightError::NotFound("Course not found".to_string())),
        None => {
            let email = require(query.user_email.as_deref(), "Course id or user email is required")?;
            Ok(CourseListing::Many(ctx.store().list_courses(email)?))
        }
    }
}

/// `{success, course}` for a single id, `{success, courses}` otherwise
pub fn handle(ctx: &TaskContext, query: &CourseQuery) -> ApiResponse {
    ApiResponse::from_result(list(ctx, query).map(|listing| match listing {
        CourseListing::One(course) => json!({ "course": course }),
        CourseListing::Many(courses) => json!({ "courses": courses }),
    }))
}
