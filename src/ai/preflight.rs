//! Pre-flight Validation Checks
//!
//! Validates credentials, endpoints and storage before any generation runs,
//! so `doctor` reports every problem at once instead of the first one a task
//! would hit.

use std::path::Path;
use std::time::Instant;

use tracing::{info, warn};

use crate::config::{Config, CredentialStore, TaskKind};
use crate::storage::Database;

/// Pre-flight check results
#[derive(Debug, Clone)]
pub struct PreflightResult {
    /// All checks passed
    pub passed: bool,
    pub checks: Vec<CheckResult>,
    /// Non-blocking
    pub warnings: Vec<String>,
    /// Blocking
    pub errors: Vec<String>,
    pub recommendations: Vec<String>,
}

impl PreflightResult {
    pub fn new() -> Self {
        Self {
            passed: true,
            checks: Vec::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
            recommendations: Vec::new(),
        }
    }

    fn add_check(&mut self, check: CheckResult) {
        if !check.passed {
            self.passed = false;
            self.errors.push(check.message.clone());
        }
        if let Some(ref warn) = check.warning {
            self.warnings.push(warn.clone());
        }
        self.checks.push(check);
    }

    fn add_recommendation(&mut self, rec: String) {
        if !self.recommendations.contains(&rec) {
            self.recommendations.push(rec);
        }
    }
}

impl Default for PreflightResult {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub message: String,
    pub warning: Option<String>,
    pub duration_ms: u64,
}

impl CheckResult {
    fn new(name: impl Into<String>, passed: bool, message: impl Into<String>, start: Instant) -> Self {
        Self {
            name: name.into(),
            passed,
            message: message.into(),
            warning: None,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warning = Some(warning.into());
        self
    }
}

/// Pre-flight validation checker
pub struct PreflightCheck<'a> {
    config: &'a Config,
    credentials: &'a CredentialStore,
}

impl<'a> PreflightCheck<'a> {
    pub fn new(config: &'a Config, credentials: &'a CredentialStore) -> Self {
        Self { config, credentials }
    }

    /// Run every check; storage is opened at `database_path`
    pub fn run(&self, database_path: &Path) -> PreflightResult {
        let mut result = PreflightResult::new();

        info!("Running pre-flight checks...");

        self.check_config(&mut result);
        self.check_credentials(&mut result);
        self.check_video_lookup(&mut result);
        self.check_database(database_path, &mut result);

        if result.passed {
            info!("Pre-flight checks passed ({} checks)", result.checks.len());
        } else {
            warn!("Pre-flight checks failed: {} errors", result.errors.len());
        }

        result
    }

    fn check_config(&self, result: &mut PreflightResult) {
        let start = Instant::now();
        let check = match self.config.validate() {
            Ok(()) => CheckResult::new("config", true, "Configuration is valid", start),
            Err(e) => CheckResult::new("config", false, e.to_string(), start),
        };
        result.add_check(check);
    }

    /// One check per task: every candidate's key variable must be set
    fn check_credentials(&self, result: &mut PreflightResult) {
        let missing = self.credentials.missing(self.config);

        for kind in TaskKind::ALL {
            let start = Instant::now();
            let task = self.config.tasks.get(kind);
            let unset: Vec<&str> = missing
                .iter()
                .filter(|(k, _)| *k == kind)
                .map(|(_, var)| var.as_str())
                .collect();

            let check = if unset.is_empty() {
                let models: Vec<String> = task
                    .candidates
                    .iter()
                    .map(|c| format!("{}/{}", c.provider, c.model))
                    .collect();
                CheckResult::new(
                    format!("credentials_{}", kind.key()),
                    true,
                    format!("{}: {}", kind, models.join(" -> ")),
                    start,
                )
            } else {
                for var in &unset {
                    result.add_recommendation(format!("Set the {} environment variable", var));
                }
                CheckResult::new(
                    format!("credentials_{}", kind.key()),
                    false,
                    format!("{}: missing {}", kind, unset.join(", ")),
                    start,
                )
            };
            result.add_check(check);
        }
    }

    /// Missing YouTube key only disables video enrichment
    fn check_video_lookup(&self, result: &mut PreflightResult) {
        let start = Instant::now();
        let youtube = &self.config.youtube;

        let check = if !youtube.enabled {
            CheckResult::new("youtube", true, "Video enrichment disabled", start)
        } else if self.credentials.get(&youtube.api_key_env).is_some() {
            CheckResult::new("youtube", true, "YouTube Data API key present", start)
        } else {
            CheckResult::new("youtube", true, "YouTube Data API key not set", start)
                .with_warning(format!("{} is not set; topics will carry no videos", youtube.api_key_env))
        };
        result.add_check(check);
    }

    fn check_database(&self, path: &Path, result: &mut PreflightResult) {
        let start = Instant::now();
        let check = match Database::open(path).and_then(|db| {
            db.initialize()?;
            db.schema_version()
        }) {
            Ok(version) => CheckResult::new(
                "database",
                true,
                format!("Database ready: {} (schema v{})", path.display(), version),
                start,
            ),
            Err(e) => {
                result.add_recommendation(format!("Check that {} is writable", path.display()));
                CheckResult::new("database", false, format!("Cannot open database: {}", e), start)
            }
        };
        result.add_check(check);
    }
}
