//! Credential resolution
//!
//! API keys are read from environment variables named by each candidate's
//! `credential_env`. Resolution happens before any network call so a missing
//! key fails fast instead of surfacing as a provider error.

use std::collections::HashMap;
use std::time::Duration;

use super::types::{Config, TaskConfig, TaskKind};
use crate::ai::provider::{Candidate, Credential, ProviderKind};
use crate::types::{InsightError, Result};

type Lookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

pub struct CredentialStore {
    lookup: Lookup,
}

impl CredentialStore {
    /// Read keys from the process environment
    pub fn from_env() -> Self {
        Self {
            lookup: Box::new(|name| std::env::var(name).ok()),
        }
    }

    /// Read keys from a fixed map
    pub fn from_map(values: HashMap<String, String>) -> Self {
        Self {
            lookup: Box::new(move |name| values.get(name).cloned()),
        }
    }

    pub fn get(&self, env_var: &str) -> Option<String> {
        (self.lookup)(env_var).filter(|value| !value.trim().is_empty())
    }

    pub fn resolve(&self, provider: ProviderKind, env_var: &str) -> Result<Credential> {
        self.get(env_var)
            .map(Credential::new)
            .ok_or_else(|| InsightError::MissingCredential {
                provider: provider.to_string(),
                env_var: env_var.to_string(),
            })
    }

    /// Build the ordered candidate list for a task
    pub fn candidates(&self, task: &TaskConfig, default_timeout: Duration) -> Result<Vec<Candidate>> {
        task.candidates
            .iter()
            .map(|c| -> Result<Candidate> {
                let credential = self.resolve(c.provider, &c.credential_env)?;
                let timeout = c.timeout_secs.map(Duration::from_secs).unwrap_or(default_timeout);
                Ok(Candidate::new(c.provider, c.model.clone(), credential).with_timeout(timeout))
            })
            .collect()
    }

    /// Environment variables referenced by the configuration that are not set
    pub fn missing(&self, config: &Config) -> Vec<(TaskKind, String)> {
        let mut missing = Vec::new();
        for kind in TaskKind::ALL {
            for candidate in &config.tasks.get(kind).candidates {
                if self.get(&candidate.credential_env).is_none() {
                    missing.push((kind, candidate.credential_env.clone()));
                }
            }
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CandidateConfig;

    fn store(pairs: &[(&str, &str)]) -> CredentialStore {
        CredentialStore::from_map(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_resolve_missing_fails_fast() {
        let err = store(&[]).resolve(ProviderKind::Nvidia, "NVIDIA_API_KEY_QUIZ").unwrap_err();
        match err {
            InsightError::MissingCredential { provider, env_var } => {
                assert_eq!(provider, "nvidia");
                assert_eq!(env_var, "NVIDIA_API_KEY_QUIZ");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        assert!(store(&[("KEY", "  ")]).resolve(ProviderKind::Gemini, "KEY").is_err());
    }

    #[test]
    fn test_candidates_apply_timeouts_in_order() {
        let task = TaskConfig {
            candidates: vec![
                CandidateConfig::new(ProviderKind::Gemini, "gemini-flash-latest", "G"),
                CandidateConfig::new(ProviderKind::OpenRouter, "m", "O").with_timeout_secs(30),
            ],
            ..Default::default()
        };

        let candidates = store(&[("G", "g-key"), ("O", "o-key")])
            .candidates(&task, Duration::from_secs(60))
            .unwrap();

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].model, "gemini-flash-latest");
        assert_eq!(candidates[0].timeout, Duration::from_secs(60));
        assert_eq!(candidates[1].timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_missing_lists_unset_variables() {
        let config = Config::default();
        let missing = store(&[("GEMINI_API_COURSE", "x")]).missing(&config);

        assert!(missing.iter().all(|(_, var)| var != "GEMINI_API_COURSE"));
        assert!(missing.iter().any(|(kind, var)| *kind == TaskKind::Quiz && var == "NVIDIA_API_KEY_QUIZ"));
    }
}
