//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Every generation task owns an ordered candidate list; the first entry is the
//! primary model and the rest are fallbacks.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::ai::client::{BackoffPolicy, ClientConfig};
use crate::ai::prompt::SamplingParams;
use crate::ai::provider::{CircuitBreakerConfig, ProviderEndpoints, ProviderKind};
use crate::constants::{backoff, chain, circuit_breaker, network, tasks, youtube};
use crate::types::{InsightError, Result};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Defaults shared by every generation call
    pub generation: GenerationConfig,

    /// Delay policy between attempts
    pub backoff: BackoffConfig,

    /// Per-candidate quota breaker
    pub circuit_breaker: CircuitBreakerSettings,

    /// Provider API endpoints
    pub providers: ProvidersConfig,

    /// Candidate lists per task
    pub tasks: TasksConfig,

    /// Relational store settings
    pub storage: StorageConfig,

    /// Video enrichment settings
    pub youtube: YoutubeConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            generation: GenerationConfig::default(),
            backoff: BackoffConfig::default(),
            circuit_breaker: CircuitBreakerSettings::default(),
            providers: ProvidersConfig::default(),
            tasks: TasksConfig::default(),
            storage: StorageConfig::default(),
            youtube: YoutubeConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `InsightError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        if self.generation.max_retries == 0 {
            return Err(InsightError::Config(
                "generation.max_retries must be greater than 0".to_string(),
            ));
        }

        if self.generation.timeout_secs == 0 {
            return Err(InsightError::Config(
                "generation.timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.backoff.base_delay_ms > self.backoff.max_delay_ms {
            return Err(InsightError::Config(format!(
                "backoff.base_delay_ms ({}) exceeds backoff.max_delay_ms ({})",
                self.backoff.base_delay_ms, self.backoff.max_delay_ms
            )));
        }

        if self.circuit_breaker.cooldown_secs == 0
            || self.circuit_breaker.cooldown_secs > circuit_breaker::MAX_COOLDOWN_SECS
        {
            return Err(InsightError::Config(format!(
                "circuit_breaker.cooldown_secs must be between 1 and {}",
                circuit_breaker::MAX_COOLDOWN_SECS
            )));
        }

        if self.circuit_breaker.half_open_max_requests == 0 {
            return Err(InsightError::Config(
                "circuit_breaker.half_open_max_requests must be greater than 0".to_string(),
            ));
        }

        self.providers.endpoints().validate()?;

        for kind in TaskKind::ALL {
            self.tasks.get(kind).validate(kind)?;
        }

        if self.storage.pool_size == 0 {
            return Err(InsightError::Config(
                "storage.pool_size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Resilient client settings derived from this configuration
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            backoff: BackoffPolicy {
                base: Duration::from_millis(self.backoff.base_delay_ms),
                max_delay: Duration::from_millis(self.backoff.max_delay_ms),
                max_jitter: Duration::from_millis(self.backoff.max_jitter_ms),
                retry_after_cap: Duration::from_secs(self.backoff.retry_after_cap_secs),
            },
            circuit_breaker: CircuitBreakerConfig {
                default_cooldown: Duration::from_secs(self.circuit_breaker.cooldown_secs),
                half_open_max_requests: self.circuit_breaker.half_open_max_requests,
            },
        }
    }
}

// =============================================================================
// Generation Defaults
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Attempts per candidate for retryable failures
    pub max_retries: u8,

    /// Per-attempt timeout used when a candidate does not set its own
    pub timeout_secs: u64,

    /// Fixed delay between sequential chapter generations
    pub chapter_delay_ms: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_retries: chain::DEFAULT_MAX_RETRIES,
            timeout_secs: network::DEFAULT_TIMEOUT_SECS,
            chapter_delay_ms: tasks::CHAPTER_DELAY_MS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_jitter_ms: u64,
    pub retry_after_cap_secs: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: backoff::BASE_DELAY_MS,
            max_delay_ms: backoff::MAX_DELAY_MS,
            max_jitter_ms: backoff::MAX_JITTER_MS,
            retry_after_cap_secs: backoff::RETRY_AFTER_CAP_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    /// Open duration when the provider gave no retry hint
    pub cooldown_secs: u64,
    pub half_open_max_requests: u32,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            cooldown_secs: circuit_breaker::DEFAULT_COOLDOWN_SECS,
            half_open_max_requests: circuit_breaker::HALF_OPEN_MAX_REQUESTS,
        }
    }
}

// =============================================================================
// Providers
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub gemini_api_base: String,
    pub nvidia_api_base: String,
    pub openrouter_api_base: String,

    /// Sent as `HTTP-Referer` to OpenRouter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openrouter_referer: Option<String>,

    /// Sent as `X-Title` to OpenRouter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openrouter_title: Option<String>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            gemini_api_base: ProviderKind::Gemini.default_api_base().to_string(),
            nvidia_api_base: ProviderKind::Nvidia.default_api_base().to_string(),
            openrouter_api_base: ProviderKind::OpenRouter.default_api_base().to_string(),
            openrouter_referer: None,
            openrouter_title: Some("InsightForge".to_string()),
        }
    }
}

impl ProvidersConfig {
    pub fn endpoints(&self) -> ProviderEndpoints {
        ProviderEndpoints {
            gemini: self.gemini_api_base.clone(),
            nvidia: self.nvidia_api_base.clone(),
            openrouter: self.openrouter_api_base.clone(),
            openrouter_referer: self.openrouter_referer.clone(),
            openrouter_title: self.openrouter_title.clone(),
        }
    }
}

// =============================================================================
// Tasks
// =============================================================================

/// Generation tasks with their own candidate lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    CourseLayout,
    CourseContent,
    Quiz,
    Grammar,
    Chat,
    PdfChat,
    Summarize,
    ImageToText,
}

impl TaskKind {
    pub const ALL: [TaskKind; 8] = [
        Self::CourseLayout,
        Self::CourseContent,
        Self::Quiz,
        Self::Grammar,
        Self::Chat,
        Self::PdfChat,
        Self::Summarize,
        Self::ImageToText,
    ];

    /// Config key under `[tasks]`
    pub fn key(&self) -> &'static str {
        match self {
            Self::CourseLayout => "course_layout",
            Self::CourseContent => "course_content",
            Self::Quiz => "quiz",
            Self::Grammar => "grammar",
            Self::Chat => "chat",
            Self::PdfChat => "pdf_chat",
            Self::Summarize => "summarize",
            Self::ImageToText => "image_to_text",
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// One configured (provider, model) pair
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateConfig {
    pub provider: ProviderKind,
    pub model: String,
    /// Environment variable holding the API key
    pub credential_env: String,
    /// Overrides `generation.timeout_secs`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl CandidateConfig {
    pub fn new(provider: ProviderKind, model: &str, credential_env: &str) -> Self {
        Self {
            provider,
            model: model.to_string(),
            credential_env: credential_env.to_string(),
            timeout_secs: None,
        }
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct TaskConfig {
    pub candidates: Vec<CandidateConfig>,

    /// Overrides `generation.max_retries`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u8>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl TaskConfig {
    fn with_candidates(candidates: Vec<CandidateConfig>) -> Self {
        Self {
            candidates,
            ..Default::default()
        }
    }

    fn sampling(mut self, temperature: f32, top_p: f32, max_tokens: u32) -> Self {
        self.temperature = Some(temperature);
        self.top_p = Some(top_p);
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn sampling_params(&self) -> SamplingParams {
        SamplingParams {
            temperature: self.temperature,
            top_p: self.top_p,
            max_tokens: self.max_tokens,
        }
    }

    fn validate(&self, kind: TaskKind) -> Result<()> {
        if self.candidates.is_empty() {
            return Err(InsightError::Config(format!(
                "tasks.{}.candidates must not be empty",
                kind
            )));
        }

        if self.max_retries == Some(0) {
            return Err(InsightError::Config(format!(
                "tasks.{}.max_retries must be greater than 0",
                kind
            )));
        }

        if let Some(temperature) = self.temperature
            && !(0.0..=2.0).contains(&temperature)
        {
            return Err(InsightError::Config(format!(
                "tasks.{}.temperature must be between 0.0 and 2.0, got {}",
                kind, temperature
            )));
        }

        for candidate in &self.candidates {
            if candidate.model.trim().is_empty() {
                return Err(InsightError::Config(format!(
                    "tasks.{}: candidate model must not be empty",
                    kind
                )));
            }
            if candidate.credential_env.trim().is_empty() {
                return Err(InsightError::Config(format!(
                    "tasks.{}: {}/{} has no credential_env",
                    kind, candidate.provider, candidate.model
                )));
            }
            if candidate.timeout_secs == Some(0) {
                return Err(InsightError::Config(format!(
                    "tasks.{}: {}/{} timeout_secs must be greater than 0",
                    kind, candidate.provider, candidate.model
                )));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TasksConfig {
    pub course_layout: TaskConfig,
    pub course_content: TaskConfig,
    pub quiz: TaskConfig,
    pub grammar: TaskConfig,
    pub chat: TaskConfig,
    pub pdf_chat: TaskConfig,
    pub summarize: TaskConfig,
    pub image_to_text: TaskConfig,
}

impl Default for TasksConfig {
    fn default() -> Self {
        use ProviderKind::{Gemini, Nvidia, OpenRouter};

        Self {
            course_layout: TaskConfig::with_candidates(vec![
                CandidateConfig::new(Gemini, "gemini-flash-latest", "GEMINI_API_COURSE"),
                CandidateConfig::new(Gemini, "gemini-2.0-flash", "GEMINI_API_COURSE"),
            ]),
            course_content: TaskConfig::with_candidates(vec![
                CandidateConfig::new(Nvidia, "meta/llama-3.1-405b-instruct", "NVIDIA_API_KEY_CONTENT"),
                CandidateConfig::new(Nvidia, "meta/llama-3.3-70b-instruct", "NVIDIA_API_KEY_CONTENT"),
            ])
            .sampling(0.2, 1.0, 8192),
            quiz: TaskConfig::with_candidates(vec![CandidateConfig::new(
                Nvidia,
                "google/gemma-3-1b-it",
                "NVIDIA_API_KEY_QUIZ",
            )])
            .sampling(0.1, 0.7, 512),
            grammar: TaskConfig::with_candidates(vec![
                CandidateConfig::new(OpenRouter, "xiaomi/mimo-v2-flash:free", "OPENROUTER_API_KEY_GRAMMAR")
                    .with_timeout_secs(30),
            ]),
            chat: TaskConfig::with_candidates(vec![CandidateConfig::new(
                Gemini,
                "gemini-flash-latest",
                "GEMINI_API_KEY_THINK_BOT",
            )]),
            pdf_chat: TaskConfig::with_candidates(vec![CandidateConfig::new(
                OpenRouter,
                "tngtech/deepseek-r1t2-chimera:free",
                "OPENROUTER_API_KEY_CHATPDF",
            )]),
            summarize: TaskConfig::with_candidates(vec![CandidateConfig::new(
                OpenRouter,
                "meta-llama/llama-3.3-70b-instruct:free",
                "OPENROUTER_API_KEY_SUMMARIZE",
            )]),
            image_to_text: TaskConfig::with_candidates(vec![
                CandidateConfig::new(OpenRouter, "allenai/molmo-2-8b:free", "OPENROUTER_API_KEY_CONTENT")
                    .with_timeout_secs(30),
            ]),
        }
    }
}

impl TasksConfig {
    pub fn get(&self, kind: TaskKind) -> &TaskConfig {
        match kind {
            TaskKind::CourseLayout => &self.course_layout,
            TaskKind::CourseContent => &self.course_content,
            TaskKind::Quiz => &self.quiz,
            TaskKind::Grammar => &self.grammar,
            TaskKind::Chat => &self.chat,
            TaskKind::PdfChat => &self.pdf_chat,
            TaskKind::Summarize => &self.summarize,
            TaskKind::ImageToText => &self.image_to_text,
        }
    }
}

// =============================================================================
// Storage & Lookups
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file
    pub database_path: PathBuf,

    /// Connection pool size
    pub pool_size: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(".insightforge/insightforge.db"),
            pool_size: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YoutubeConfig {
    /// Attach videos to generated topics
    pub enabled: bool,
    pub api_base: String,
    /// Environment variable holding the YouTube Data API key
    pub api_key_env: String,
    pub max_results: u32,
    pub timeout_secs: u64,
}

impl Default for YoutubeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_base: youtube::SEARCH_URL.to_string(),
            api_key_env: "YOUTUBE_API_KEY".to_string(),
            max_results: youtube::MAX_RESULTS,
            timeout_secs: network::LOOKUP_TIMEOUT_SECS,
        }
    }
}
