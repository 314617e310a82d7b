//! Doctor Command
//!
//! Runs the pre-flight checks without touching any provider.

use std::path::Path;

use crate::ai::PreflightCheck;
use crate::cli::ui::Output;
use crate::cli::util::load_config;
use crate::config::CredentialStore;
use crate::types::Result;

/// Returns whether every blocking check passed
pub fn run(config_path: Option<&Path>) -> Result<bool> {
    let out = Output::new();
    let config = load_config(config_path)?;
    let credentials = CredentialStore::from_env();

    let result = PreflightCheck::new(&config, &credentials).run(&config.storage.database_path);

    out.section("InsightForge Doctor");
    for check in &result.checks {
        out.check(check);
    }

    if !result.recommendations.is_empty() {
        out.section("Recommendations");
        for rec in &result.recommendations {
            out.info(rec);
        }
    }

    println!();
    if result.passed {
        out.success(&format!("All {} checks passed", result.checks.len()));
    } else {
        out.error(&format!("{} check(s) failed", result.errors.len()));
    }

    Ok(result.passed)
}
