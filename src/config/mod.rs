//! Configuration Management
//!
//! Unified configuration system with hierarchical resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/insightforge/config.toml)
//! 3. Project config (.insightforge/config.toml)
//! 4. Environment variables (INSIGHTFORGE_*, `__` separates nested keys)

mod credentials;
mod loader;
mod types;

pub use credentials::CredentialStore;
pub use loader::{ConfigFormat, ConfigLoader};
pub use types::*;
