//! Database Layer with Connection Pooling
//!
//! SQLite-backed [`ContentStore`] featuring:
//! - Connection pooling via r2d2 for concurrent access
//! - WAL mode for concurrent readers during generation runs
//! - JSON columns for generated course outlines and content

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OptionalExtension, Row, params, types::Type};
use serde_json::Value;

use super::ContentStore;
use crate::types::{CourseRecord, InsightError, PdfDocument, QuizResult, Result, ResultExt};

/// Shared database handle for async contexts.
pub type SharedDatabase = Arc<Database>;

const SCHEMA: &str = include_str!("schema.sql");

/// Current schema version
const SCHEMA_VERSION: u32 = 1;

/// Connection pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of connections in the pool
    pub max_size: u32,
    /// Minimum idle connections to keep ready
    pub min_idle: u32,
    /// Timeout for acquiring a connection (seconds)
    pub connection_timeout_secs: u64,
}

impl PoolConfig {
    pub fn with_max_size(max_size: u32) -> Self {
        let max_size = max_size.max(1);
        Self {
            max_size,
            min_idle: (max_size / 4).max(1),
            connection_timeout_secs: 30,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::with_max_size(4)
    }
}

/// Thread-safe database with connection pooling.
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl Database {
    /// Open database with connection pooling at the specified path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, PoolConfig::default())
    }

    /// Open database with custom pool configuration, creating parent directories.
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: PoolConfig) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let manager =
            SqliteConnectionManager::file(path.as_ref()).with_init(Self::configure_connection);

        let pool = Pool::builder()
            .max_size(config.max_size)
            .min_idle(Some(config.min_idle))
            .connection_timeout(std::time::Duration::from_secs(
                config.connection_timeout_secs,
            ))
            .build(manager)
            .map_err(|e| InsightError::Storage(format!("Failed to create connection pool: {}", e)))?;

        Ok(Self { pool })
    }

    /// Open an in-memory database for testing or temporary use.
    pub fn open_in_memory() -> Result<Self> {
        let manager = SqliteConnectionManager::memory();

        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| InsightError::Storage(format!("Failed to create in-memory pool: {}", e)))?;

        Ok(Self { pool })
    }

    fn configure_connection(conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| {
            InsightError::Storage(format!("Failed to acquire database connection: {}", e))
        })
    }

    /// Initialize database schema.
    pub fn initialize(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA)
            .with_context("Failed to initialize database schema")?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)
            .with_context("Failed to set schema version")?;
        Ok(())
    }

    pub fn schema_version(&self) -> Result<u32> {
        let conn = self.conn()?;
        conn.pragma_query_value(None, "user_version", |row| row.get(0))
            .with_context("Failed to read schema version")
    }

    /// Get a raw connection for advanced operations.
    pub fn connection(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        self.conn()
    }

    // =========================================================================
    // Row Mapping
    // =========================================================================

    fn map_course(row: &Row<'_>) -> rusqlite::Result<CourseRecord> {
        let course_json: String = row.get(7)?;
        let course_content: Option<String> = row.get(10)?;

        Ok(CourseRecord {
            cid: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            no_of_chapters: row.get(3)?,
            include_video: row.get(4)?,
            level: row.get(5)?,
            category: row.get(6)?,
            course_json: parse_json(7, &course_json)?,
            user_email: row.get(8)?,
            banner_image_url: row.get(9)?,
            course_content: course_content
                .map(|text| parse_json(10, &text))
                .transpose()?,
        })
    }

    fn map_quiz_result(row: &Row<'_>) -> rusqlite::Result<QuizResult> {
        let date: String = row.get(5)?;
        Ok(QuizResult {
            id: row.get(0)?,
            user_email: row.get(1)?,
            topic: row.get(2)?,
            score: row.get(3)?,
            total_questions: row.get(4)?,
            date: parse_timestamp(5, &date)?,
        })
    }

    fn map_pdf(row: &Row<'_>) -> rusqlite::Result<PdfDocument> {
        let uploaded_at: String = row.get(4)?;
        Ok(PdfDocument {
            id: row.get(0)?,
            user_email: row.get(1)?,
            file_name: row.get(2)?,
            pdf_text: row.get(3)?,
            uploaded_at: parse_timestamp(4, &uploaded_at)?,
        })
    }
}

const COURSE_COLUMNS: &str = "cid, name, description, no_of_chapters, include_video, level, \
     category, course_json, user_email, banner_image_url, course_content";

fn parse_json(idx: usize, text: &str) -> rusqlite::Result<Value> {
    serde_json::from_str(text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_timestamp(idx: usize, text: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

impl ContentStore for Database {
    fn insert_course(&self, course: &CourseRecord) -> Result<()> {
        let conn = self.conn()?;
        let course_json = serde_json::to_string(&course.course_json)?;
        let course_content = course
            .course_content
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        conn.execute(
            &format!(
                "INSERT INTO courses ({}, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                COURSE_COLUMNS
            ),
            params![
                course.cid,
                course.name,
                course.description,
                course.no_of_chapters,
                course.include_video,
                course.level,
                course.category,
                course_json,
                course.user_email,
                course.banner_image_url,
                course_content,
                Utc::now().to_rfc3339(),
            ],
        )
        .with_context_fn(|| format!("Failed to insert course {}", course.cid))?;

        Ok(())
    }

    fn get_course(&self, cid: &str) -> Result<Option<CourseRecord>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM courses WHERE cid = ?1", COURSE_COLUMNS),
            params![cid],
            Self::map_course,
        )
        .optional()
        .with_context_fn(|| format!("Failed to load course {}", cid))
    }

    fn list_courses(&self, user_email: &str) -> Result<Vec<CourseRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM courses WHERE user_email = ?1 ORDER BY created_at DESC",
                COURSE_COLUMNS
            ))
            .with_context("Failed to prepare course listing")?;

        let courses = stmt
            .query_map(params![user_email], Self::map_course)
            .with_context("Failed to list courses")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .with_context("Failed to read course row")?;
        Ok(courses)
    }

    fn list_generated_courses(&self) -> Result<Vec<CourseRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM courses \
                 WHERE course_content IS NOT NULL AND TRIM(course_content) NOT IN ('', '[]', '{{}}', 'null') \
                 ORDER BY created_at DESC, rowid DESC",
                COURSE_COLUMNS
            ))
            .with_context("Failed to prepare generated course listing")?;

        let courses = stmt
            .query_map([], Self::map_course)
            .with_context("Failed to list generated courses")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .with_context("Failed to read course row")?;
        Ok(courses)
    }

    fn update_course_content(&self, cid: &str, content: &Value) -> Result<()> {
        let conn = self.conn()?;
        let text = serde_json::to_string(content)?;
        let updated = conn
            .execute(
                "UPDATE courses SET course_content = ?1 WHERE cid = ?2",
                params![text, cid],
            )
            .with_context_fn(|| format!("Failed to update content of course {}", cid))?;

        if updated == 0 {
            return Err(InsightError::NotFound(format!("course {}", cid)));
        }
        Ok(())
    }

    fn save_quiz_result(&self, result: &QuizResult) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO quiz_results (user_email, topic, score, total_questions, date) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                result.user_email,
                result.topic,
                result.score,
                result.total_questions,
                result.date.to_rfc3339(),
            ],
        )
        .with_context("Failed to save quiz result")?;
        Ok(conn.last_insert_rowid())
    }

    fn quiz_history(&self, user_email: &str) -> Result<Vec<QuizResult>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, user_email, topic, score, total_questions, date \
                 FROM quiz_results WHERE user_email = ?1 ORDER BY date DESC, id DESC",
            )
            .with_context("Failed to prepare quiz history")?;

        let results = stmt
            .query_map(params![user_email], Self::map_quiz_result)
            .with_context("Failed to query quiz history")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .with_context("Failed to read quiz result row")?;
        Ok(results)
    }

    fn insert_pdf(&self, document: &PdfDocument) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO user_pdfs (user_email, file_name, pdf_text, uploaded_at) \
             VALUES (?1, ?2, ?3, ?4)",
            params![
                document.user_email,
                document.file_name,
                document.pdf_text,
                document.uploaded_at.to_rfc3339(),
            ],
        )
        .with_context_fn(|| format!("Failed to store PDF {}", document.file_name))?;
        Ok(conn.last_insert_rowid())
    }

    fn get_pdf(&self, id: i64) -> Result<Option<PdfDocument>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, user_email, file_name, pdf_text, uploaded_at FROM user_pdfs WHERE id = ?1",
            params![id],
            Self::map_pdf,
        )
        .optional()
        .with_context_fn(|| format!("Failed to load PDF {}", id))
    }

    fn list_pdfs(&self, user_email: &str) -> Result<Vec<PdfDocument>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, user_email, file_name, pdf_text, uploaded_at \
                 FROM user_pdfs WHERE user_email = ?1 ORDER BY uploaded_at DESC, id DESC",
            )
            .with_context("Failed to prepare PDF listing")?;

        let documents = stmt
            .query_map(params![user_email], Self::map_pdf)
            .with_context("Failed to list PDFs")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .with_context("Failed to read PDF row")?;
        Ok(documents)
    }

    fn delete_pdf(&self, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn
            .execute("DELETE FROM user_pdfs WHERE id = ?1", params![id])
            .with_context_fn(|| format!("Failed to delete PDF {}", id))?;
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;
    use tempfile::TempDir;

    fn db() -> Database {
        let db = Database::open_in_memory().expect("Failed to open in-memory database");
        db.initialize().expect("Failed to initialize schema");
        db
    }

    fn course(cid: &str, email: &str) -> CourseRecord {
        CourseRecord {
            cid: cid.to_string(),
            name: "Rust Basics".to_string(),
            description: "Ownership and borrowing".to_string(),
            no_of_chapters: 2,
            include_video: true,
            level: "Beginner".to_string(),
            category: "Programming".to_string(),
            course_json: json!({"course": {"name": "Rust Basics"}}),
            user_email: email.to_string(),
            banner_image_url: Some("https://image.pollinations.ai/prompt/rust?nologo=true".to_string()),
            course_content: None,
        }
    }

    #[test]
    fn test_initialize_creates_tables() {
        let db = db();
        let conn = db.connection().unwrap();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"courses".to_string()));
        assert!(tables.contains(&"quiz_results".to_string()));
        assert!(tables.contains(&"user_pdfs".to_string()));
        drop(conn);
        assert_eq!(db.schema_version().unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_course_roundtrip_and_content_update() {
        let db = db();
        db.insert_course(&course("c-1", "a@example.com")).unwrap();

        let loaded = db.get_course("c-1").unwrap().unwrap();
        assert_eq!(loaded, course("c-1", "a@example.com"));

        let content = json!([{"chapterName": "Intro", "topics": []}]);
        db.update_course_content("c-1", &content).unwrap();
        assert_eq!(db.get_course("c-1").unwrap().unwrap().course_content, Some(content));

        assert!(db.get_course("missing").unwrap().is_none());
        assert!(matches!(
            db.update_course_content("missing", &json!([])),
            Err(InsightError::NotFound(_))
        ));
    }

    #[test]
    fn test_duplicate_course_rejected() {
        let db = db();
        db.insert_course(&course("dup", "a@example.com")).unwrap();
        assert!(db.insert_course(&course("dup", "a@example.com")).is_err());
    }

    #[test]
    fn test_list_courses_by_owner() {
        let db = db();
        db.insert_course(&course("c-1", "a@example.com")).unwrap();
        db.insert_course(&course("c-2", "b@example.com")).unwrap();

        let listed = db.list_courses("a@example.com").unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].cid, "c-1");
    }

    #[test]
    fn test_list_generated_courses_skips_empty_content() {
        let db = db();
        db.insert_course(&course("pending", "a@example.com")).unwrap();
        db.insert_course(&course("empty", "a@example.com")).unwrap();
        db.update_course_content("empty", &json!([])).unwrap();
        db.insert_course(&course("older", "b@example.com")).unwrap();
        db.update_course_content("older", &json!([{"chapterName": "One"}])).unwrap();
        db.insert_course(&course("newer", "a@example.com")).unwrap();
        db.update_course_content("newer", &json!([{"chapterName": "Two"}])).unwrap();

        let cids: Vec<_> = db
            .list_generated_courses()
            .unwrap()
            .into_iter()
            .map(|c| c.cid)
            .collect();
        assert_eq!(cids, vec!["newer", "older"]);
    }

    #[test]
    fn test_quiz_history_newest_first() {
        let db = db();
        let now = Utc::now();
        for (topic, offset) in [("Rust", 2), ("Go", 1), ("SQL", 3)] {
            db.save_quiz_result(&QuizResult {
                id: None,
                user_email: "a@example.com".to_string(),
                topic: topic.to_string(),
                score: 4,
                total_questions: 5,
                date: now - Duration::minutes(offset),
            })
            .unwrap();
        }

        let history = db.quiz_history("a@example.com").unwrap();
        let topics: Vec<_> = history.iter().map(|r| r.topic.as_str()).collect();
        assert_eq!(topics, vec!["Go", "Rust", "SQL"]);
        assert!(history.iter().all(|r| r.id.is_some()));
        assert!(db.quiz_history("nobody@example.com").unwrap().is_empty());
    }

    #[test]
    fn test_pdf_lifecycle() {
        let db = db();
        let id = db
            .insert_pdf(&PdfDocument {
                id: None,
                user_email: "a@example.com".to_string(),
                file_name: "notes.pdf".to_string(),
                pdf_text: "Chapter one".to_string(),
                uploaded_at: Utc::now(),
            })
            .unwrap();

        let pdf = db.get_pdf(id).unwrap().unwrap();
        assert_eq!(pdf.file_name, "notes.pdf");
        assert_eq!(db.list_pdfs("a@example.com").unwrap().len(), 1);

        assert!(db.delete_pdf(id).unwrap());
        assert!(!db.delete_pdf(id).unwrap());
        assert!(db.get_pdf(id).unwrap().is_none());
    }

    #[test]
    fn test_open_file_database_creates_parent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("store.db");

        let db = Database::open_with_config(&path, PoolConfig::with_max_size(2)).unwrap();
        db.initialize().unwrap();
        db.insert_course(&course("c-1", "a@example.com")).unwrap();
        assert!(path.exists());
    }
}
