//! Init Command
//!
//! Writes the project configuration and creates the content database.

use tracing::debug;

use crate::cli::util::open_database;
use crate::config::ConfigLoader;
use crate::types::{InsightError, Result};

pub fn run(force: bool) -> Result<()> {
    let root = std::env::current_dir()?;
    let project_dir = root.join(ConfigLoader::project_dir());

    if project_dir.join("config.toml").exists() && !force {
        return Err(InsightError::Config(
            "Already initialized. Use --force to overwrite.".to_string(),
        ));
    }

    ConfigLoader::init_project(&root, force)?;

    if let Err(e) = ConfigLoader::init_global(false) {
        debug!("Global config init skipped: {}", e);
    }

    let config = ConfigLoader::load()?;
    open_database(&config)?;

    println!("✓ Initialized InsightForge in {}/", ConfigLoader::project_dir().display());
    println!("  Database: {}", config.storage.database_path.display());
    println!();
    println!("Next steps:");
    println!("  1. Export the API keys listed by 'insightforge doctor'");
    println!("  2. Run 'insightforge layout --email you@example.com --name \"Rust Basics\"'");

    Ok(())
}
