//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (~/.config/insightforge/config.toml)
//! 3. Project config (.insightforge/config.toml)
//! 4. Environment variables (INSIGHTFORGE_* prefix)

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::types::Config;
use crate::types::{InsightError, Result};

const ENV_PREFIX: &str = "INSIGHTFORGE_";

/// Output format for `config show`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfigFormat {
    #[default]
    Toml,
    Json,
    Yaml,
}

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with full resolution chain:
    /// defaults → global → project → env vars
    pub fn load() -> Result<Config> {
        Self::load_from(
            Self::global_config_path().as_deref(),
            &Self::project_config_path(),
        )
    }

    /// Load with explicit global and project file locations
    pub fn load_from(global: Option<&Path>, project: &Path) -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(global_path) = global
            && global_path.exists()
        {
            debug!("Loading global config from: {}", global_path.display());
            figment = figment.merge(Toml::file(global_path));
        }

        if project.exists() {
            debug!("Loading project config from: {}", project.display());
            figment = figment.merge(Toml::file(project));
        }

        // INSIGHTFORGE_GENERATION__MAX_RETRIES -> generation.max_retries
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__").lowercase(true));

        let config: Config = figment
            .extract()
            .map_err(|e| InsightError::Config(format!("Configuration error: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file only
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| InsightError::Config(format!("Configuration error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// Get path to global config directory (~/.config/insightforge/)
    pub fn global_dir() -> Option<PathBuf> {
        env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                env::var("HOME")
                    .ok()
                    .map(|home| PathBuf::from(home).join(".config"))
            })
            .map(|p| p.join("insightforge"))
    }

    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join("config.toml"))
    }

    pub fn project_dir() -> PathBuf {
        PathBuf::from(".insightforge")
    }

    pub fn project_config_path() -> PathBuf {
        Self::project_dir().join("config.toml")
    }

    // =========================================================================
    // Config Commands
    // =========================================================================

    /// Show config file paths
    pub fn show_path() {
        println!("Configuration paths:");
        println!();

        if let Some(global) = Self::global_config_path() {
            let exists = if global.exists() { "✓" } else { "✗" };
            println!("  Global:  {} {}", exists, global.display());
        } else {
            println!("  Global:  (not available)");
        }

        let project = Self::project_config_path();
        let exists = if project.exists() { "✓" } else { "✗" };
        println!("  Project: {} {}", exists, project.display());
    }

    /// Render the effective configuration
    pub fn render(config: &Config, format: ConfigFormat) -> Result<String> {
        match format {
            ConfigFormat::Json => Ok(serde_json::to_string_pretty(config)?),
            ConfigFormat::Yaml => Ok(serde_yaml::to_string(config)?),
            ConfigFormat::Toml => {
                toml::to_string_pretty(config).map_err(|e| InsightError::Config(e.to_string()))
            }
        }
    }

    /// Show current effective configuration
    pub fn show_config(format: ConfigFormat) -> Result<()> {
        let config = Self::load()?;
        println!("{}", Self::render(&config, format)?);
        Ok(())
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Initialize global configuration
    pub fn init_global(force: bool) -> Result<PathBuf> {
        let global_dir = Self::global_dir().ok_or_else(|| {
            InsightError::Config("Cannot determine global config directory".to_string())
        })?;
        Self::write_config(&global_dir, &Self::default_global_config(), force)?;
        Ok(global_dir)
    }

    /// Initialize project configuration under `root`
    pub fn init_project(root: &Path, force: bool) -> Result<PathBuf> {
        let project_dir = root.join(Self::project_dir());
        Self::write_config(&project_dir, &Self::default_project_config(), force)?;
        Ok(project_dir)
    }

    fn write_config(dir: &Path, content: &str, force: bool) -> Result<()> {
        fs::create_dir_all(dir)?;

        let config_path = dir.join("config.toml");
        if !config_path.exists() || force {
            fs::write(&config_path, content)?;
            info!("Created config: {}", config_path.display());
        } else {
            info!("Config exists: {}", config_path.display());
        }
        Ok(())
    }

    // =========================================================================
    // Internal
    // =========================================================================

    fn default_global_config() -> String {
        r#"# InsightForge Global Configuration
# User-wide defaults. Project settings in .insightforge/config.toml override these.

version = "1.0"

[generation]
max_retries = 3
timeout_secs = 60
chapter_delay_ms = 2000

[backoff]
base_delay_ms = 1000
max_delay_ms = 30000
max_jitter_ms = 250
retry_after_cap_secs = 120

[circuit_breaker]
cooldown_secs = 60
"#
        .to_string()
    }

    fn default_project_config() -> String {
        r#"# InsightForge Project Configuration
# Candidates are tried in order; later entries are fallbacks.

version = "1.0"

[storage]
database_path = ".insightforge/insightforge.db"

[providers]
openrouter_title = "InsightForge"

# [[tasks.course_layout.candidates]]
# provider = "gemini"
# model = "gemini-flash-latest"
# credential_env = "GEMINI_API_COURSE"
#
# [[tasks.course_layout.candidates]]
# provider = "openrouter"
# model = "meta-llama/llama-3.3-70b-instruct:free"
# credential_env = "OPENROUTER_API_KEY_CONTENT"
# timeout_secs = 45
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_defaults_without_files() {
        let dir = TempDir::new().unwrap();
        let config = ConfigLoader::load_from(None, &dir.path().join("missing.toml")).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.generation.max_retries, 3);
    }

    #[test]
    fn test_project_overrides_global() {
        let dir = TempDir::new().unwrap();
        let global = dir.path().join("global.toml");
        let project = dir.path().join("project.toml");
        fs::write(&global, "[circuit_breaker]\ncooldown_secs = 90\n[generation]\ntimeout_secs = 20\n").unwrap();
        fs::write(&project, "[generation]\ntimeout_secs = 45\n").unwrap();

        let config = ConfigLoader::load_from(Some(&global), &project).unwrap();
        assert_eq!(config.circuit_breaker.cooldown_secs, 90);
        assert_eq!(config.generation.timeout_secs, 45);
    }

    #[test]
    fn test_project_task_candidates_replace_defaults() {
        let dir = TempDir::new().unwrap();
        let project = dir.path().join("config.toml");
        fs::write(
            &project,
            r#"
[[tasks.quiz.candidates]]
provider = "openrouter"
model = "qwen/qwen3-8b:free"
credential_env = "OPENROUTER_API_KEY_QUIZ"
"#,
        )
        .unwrap();

        let config = ConfigLoader::load_from(None, &project).unwrap();
        assert_eq!(config.tasks.quiz.candidates.len(), 1);
        assert_eq!(config.tasks.quiz.candidates[0].model, "qwen/qwen3-8b:free");
        assert_eq!(config.tasks.quiz.temperature, Some(0.1));
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let project = dir.path().join("config.toml");
        fs::write(&project, "[generation]\nmax_retries = 0\n").unwrap();

        assert!(matches!(
            ConfigLoader::load_from(None, &project),
            Err(InsightError::Config(_))
        ));
        assert!(ConfigLoader::load_from_file(&project).is_err());
    }

    #[test]
    fn test_env_override() {
        // SAFETY: variable name is unique to this test
        unsafe {
            env::set_var("INSIGHTFORGE_STORAGE__POOL_SIZE", "9");
        }
        let dir = TempDir::new().unwrap();
        let config = ConfigLoader::load_from(None, &dir.path().join("none.toml")).unwrap();
        unsafe {
            env::remove_var("INSIGHTFORGE_STORAGE__POOL_SIZE");
        }
        assert_eq!(config.storage.pool_size, 9);
    }

    #[test]
    fn test_init_project_writes_loadable_config() {
        let dir = TempDir::new().unwrap();
        let project_dir = ConfigLoader::init_project(dir.path(), false).unwrap();
        let path = project_dir.join("config.toml");
        assert!(path.exists());

        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config.providers.openrouter_title.as_deref(), Some("InsightForge"));
    }

    #[test]
    fn test_render_formats() {
        let config = Config::default();
        assert!(ConfigLoader::render(&config, ConfigFormat::Toml).unwrap().contains("[generation]"));
        assert!(ConfigLoader::render(&config, ConfigFormat::Json).unwrap().contains("\"course_layout\""));
        assert!(ConfigLoader::render(&config, ConfigFormat::Yaml).unwrap().contains("max_retries"));
    }
}
