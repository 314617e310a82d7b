//! InsightForge - Resilient AI Generation Backend
//!
//! Generation tasks for an e-learning app (course layouts and content,
//! quizzes, grammar checks, chat, PDF Q&A, video summaries, image text
//! extraction and image generation) run through one client that survives
//! provider failures. Stored courses can be listed back.
//!
//! ## Core Features
//!
//! - **Candidate Fallback**: ordered (provider, model) pairs across Gemini, NVIDIA NIM and OpenRouter
//! - **Error Classification**: rate limits, timeouts and unavailability drive retry decisions
//! - **Quota Breakers**: per-candidate circuit breakers skip models that keep rate limiting
//! - **Structured Output**: JSON extraction and repair for model text
//!
//! ## Quick Start
//!
//! ```ignore
//! use insightforge::{GenerationRequest, HttpProviderAdapter, OutputShape, Prompt, ResilientClient};
//!
//! let adapter = Arc::new(HttpProviderAdapter::new(config.providers.endpoints())?);
//! let client = ResilientClient::new(adapter, config.client_config());
//! let request = GenerationRequest::new(Prompt::user("Explain ownership"), candidates, OutputShape::RawText)?;
//! let success = client.generate(&request).await.into_result()?;
//! ```
//!
//! ## Modules
//!
//! - [`ai`]: resilient client, provider adapters, circuit breakers, JSON extraction
//! - [`tasks`]: generation tasks and the response envelope
//! - [`storage`]: SQLite persistence with connection pooling
//! - [`config`]: layered configuration and credential lookup

pub mod ai;
pub mod cli;
pub mod config;
pub mod constants;
pub mod storage;
pub mod tasks;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{Config, ConfigLoader, CredentialStore, TaskKind};

// Error Types
pub use types::error::{ErrorKind, InsightError, Result, ResultExt};

// Storage
pub use storage::database::PoolConfig;
pub use storage::{ContentStore, Database, SharedDatabase, SharedStore};

// =============================================================================
// AI Re-exports
// =============================================================================

pub use ai::{
    Candidate, CircuitBreaker, ClientConfig, GenerationOutcome, GenerationRequest,
    GenerationSuccess, HttpProviderAdapter, OutputShape, Prompt, PromptBuilder, ProviderAdapter,
    ProviderKind, ResilientClient, extract_structured, with_timeout,
};

// =============================================================================
// Task Re-exports
// =============================================================================

pub use tasks::{ApiResponse, TaskContext};
