//! Provider Abstraction
//!
//! Defines the [`ProviderAdapter`] seam between the resilient client and the
//! wire formats of individual generation APIs.
//!
//! ## Modules
//!
//! - `circuit_breaker`: per-candidate quota breaker
//! - `gemini`: Google Gemini `generateContent`
//! - `openai_compat`: OpenAI-compatible chat completions (NVIDIA NIM, OpenRouter)
//! - `http`: reqwest-backed adapter dispatching on [`ProviderKind`]

mod circuit_breaker;
mod gemini;
mod http;
mod openai_compat;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState};
pub use http::{HttpProviderAdapter, ProviderEndpoints};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::ai::prompt::Prompt;
use crate::constants::network as net_constants;
use crate::types::ProviderFailure;

// =============================================================================
// Provider Kinds
// =============================================================================

/// Supported generation providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    Nvidia,
    OpenRouter,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [Self::Gemini, Self::Nvidia, Self::OpenRouter];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Nvidia => "nvidia",
            Self::OpenRouter => "openrouter",
        }
    }

    pub fn default_api_base(&self) -> &'static str {
        match self {
            Self::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            Self::Nvidia => "https://integrate.api.nvidia.com/v1",
            Self::OpenRouter => "https://openrouter.ai/api/v1",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "nvidia" | "nim" => Ok(Self::Nvidia),
            "openrouter" => Ok(Self::OpenRouter),
            other => Err(format!(
                "Unknown provider: {}. Supported: gemini, nvidia, openrouter",
                other
            )),
        }
    }
}

// =============================================================================
// Candidates
// =============================================================================

/// API key handle. Never printed, never serialized.
#[derive(Clone)]
pub struct Credential(SecretString);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(SecretString::from(secret.into()))
    }

    pub(crate) fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

/// One (provider, model) pair to try, with its deadline and credential
#[derive(Debug, Clone)]
pub struct Candidate {
    pub provider: ProviderKind,
    pub model: String,
    pub timeout: Duration,
    pub credential: Credential,
}

impl Candidate {
    pub fn new(provider: ProviderKind, model: impl Into<String>, credential: Credential) -> Self {
        Self {
            provider,
            model: model.into(),
            timeout: Duration::from_secs(net_constants::DEFAULT_TIMEOUT_SECS),
            credential,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Stable key used for per-candidate state such as circuit breakers
    pub fn key(&self) -> String {
        format!("{}/{}", self.provider, self.model)
    }
}

impl std::fmt::Display for Candidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}

// =============================================================================
// Adapter Trait
// =============================================================================

/// Result of a single provider call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptResult {
    Success { raw_text: String },
    Failure(ProviderFailure),
}

impl AttemptResult {
    pub fn success(raw_text: impl Into<String>) -> Self {
        Self::Success {
            raw_text: raw_text.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

impl From<ProviderFailure> for AttemptResult {
    fn from(failure: ProviderFailure) -> Self {
        Self::Failure(failure)
    }
}

/// Transport seam: issue one call to the candidate's provider.
///
/// Implementations never panic and never return transport errors out of band;
/// every failure is classified into the returned [`AttemptResult`].
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    async fn send(&self, candidate: &Candidate, prompt: &Prompt) -> AttemptResult;
}

/// Shared adapter for concurrent use across requests.
pub type SharedAdapter = Arc<dyn ProviderAdapter>;
