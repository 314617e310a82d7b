//! Config Command
//!
//! Usage:
//!   insightforge config show [-g] [-f toml|json|yaml]
//!   insightforge config path
//!   insightforge config init [-g] [--force]

use std::fs;

use crate::config::{ConfigFormat, ConfigLoader};
use crate::types::{InsightError, Result};

pub fn parse_format(format: &str) -> Result<ConfigFormat> {
    match format.to_lowercase().as_str() {
        "toml" | "text" => Ok(ConfigFormat::Toml),
        "json" => Ok(ConfigFormat::Json),
        "yaml" | "yml" => Ok(ConfigFormat::Yaml),
        other => Err(InsightError::invalid(format!(
            "Invalid format '{}'. Valid values: toml, json, yaml",
            other
        ))),
    }
}

/// Show the merged configuration, or the raw global file
pub fn show(global: bool, format: &str) -> Result<()> {
    if !global {
        return ConfigLoader::show_config(parse_format(format)?);
    }

    match ConfigLoader::global_config_path() {
        Some(path) if path.exists() => {
            println!("# Global Config: {}\n", path.display());
            println!("{}", fs::read_to_string(&path)?);
        }
        Some(_) => {
            println!("No global config found.");
            println!("Run 'insightforge config init --global' to create one.");
        }
        None => println!("Cannot determine global config directory."),
    }
    Ok(())
}

pub fn path() -> Result<()> {
    ConfigLoader::show_path();
    Ok(())
}

pub fn init(global: bool, force: bool) -> Result<()> {
    if global {
        let dir = ConfigLoader::init_global(force)?;
        println!("✓ Initialized global configuration");
        println!("  Directory: {}", dir.display());
    } else {
        let root = std::env::current_dir()?;
        let dir = ConfigLoader::init_project(&root, force)?;
        println!("✓ Initialized project configuration");
        println!("  Directory: {}", dir.display());
    }
    Ok(())
}
