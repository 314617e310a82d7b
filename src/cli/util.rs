//! CLI Common Utilities
//!
//! Shared wiring for commands: configuration, storage, credentials, the
//! provider adapter, the lookup clients and the task context built on top
//! of them.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::ai::{HttpProviderAdapter, ResilientClient};
use crate::config::{Config, ConfigLoader, CredentialStore};
use crate::constants::banner;
use crate::storage::database::PoolConfig;
use crate::storage::{Database, SharedDatabase};
use crate::tasks::{PollinationsClient, TaskContext, YoutubeClient};
use crate::types::{InsightError, Result};

/// Load configuration from `path` alone, or through the full resolution chain
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            if !path.exists() {
                return Err(InsightError::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            ConfigLoader::load_from_file(path)
        }
        None => ConfigLoader::load(),
    }
}

/// Open the configured database, creating the schema when missing
pub fn open_database(config: &Config) -> Result<Database> {
    let db = Database::open_with_config(
        &config.storage.database_path,
        PoolConfig::with_max_size(config.storage.pool_size),
    )?;
    db.initialize()?;
    Ok(db)
}

/// Command execution context
pub struct CommandContext {
    pub config: Arc<Config>,
    pub db: SharedDatabase,
    pub tasks: TaskContext,
}

impl CommandContext {
    /// Wire every collaborator a generation command needs
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = Arc::new(load_config(config_path)?);
        let db = Arc::new(open_database(&config)?);
        let credentials = Arc::new(CredentialStore::from_env());

        let adapter = Arc::new(HttpProviderAdapter::new(config.providers.endpoints())?);
        let client = Arc::new(ResilientClient::new(adapter, config.client_config()));

        let images = PollinationsClient::new(Duration::from_secs(banner::FETCH_TIMEOUT_SECS))?;
        let mut tasks = TaskContext::new(client, config.clone(), credentials.clone(), db.clone())
            .with_images(Arc::new(images));
        if let Some(youtube) = YoutubeClient::from_config(&config.youtube, &credentials)? {
            tasks = tasks.with_videos(Arc::new(youtube));
        }

        debug!("Database: {}", config.storage.database_path.display());

        Ok(Self { config, db, tasks })
    }

    pub fn database_path(&self) -> PathBuf {
        self.config.storage.database_path.clone()
    }
}

/// Read a UTF-8 input file, naming the path on failure
pub fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        InsightError::invalid(format!("Cannot read {}: {}", path.display(), e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_config_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = load_config(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, InsightError::Config(_)));
    }

    #[test]
    fn test_open_database_initializes_schema() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.storage.database_path = dir.path().join("store/insightforge.db");

        let db = open_database(&config).unwrap();
        assert_eq!(db.schema_version().unwrap(), 1);
        assert!(config.storage.database_path.exists());
    }

    #[test]
    fn test_read_text_reports_path() {
        let err = read_text(Path::new("/definitely/missing.txt")).unwrap_err();
        assert!(err.to_string().contains("/definitely/missing.txt"));
    }
}
