//! Generation Tasks
//!
//! Each task builds a prompt, runs it through the [`ResilientClient`] with the
//! candidates configured for that task, and persists or shapes the result.
//! Handlers return an [`ApiResponse`] carrying the JSON envelope a web caller
//! would receive.

pub mod chat;
pub mod course_content;
pub mod course_layout;
pub mod courses;
pub mod envelope;
pub mod grammar;
pub mod image;
pub mod image_to_text;
pub mod pdf;
pub mod quiz;
pub mod summarize;
pub mod video;

pub use envelope::ApiResponse;
pub use image::{ImageSource, PollinationsClient, SharedImageSource};
pub use video::{SharedVideoLookup, VideoLookup, YoutubeClient, extract_video_id};

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::ai::clock::{Clock, TokioClock};
use crate::ai::{GenerationRequest, GenerationSuccess, OutputShape, Prompt, ResilientClient, SamplingParams};
use crate::config::{Config, CredentialStore, TaskKind};
use crate::storage::{ContentStore, SharedStore};
use crate::types::Result;

/// Shared collaborators for every task
pub struct TaskContext {
    client: Arc<ResilientClient>,
    config: Arc<Config>,
    credentials: Arc<CredentialStore>,
    store: SharedStore,
    videos: Option<SharedVideoLookup>,
    images: Option<SharedImageSource>,
    clock: Arc<dyn Clock>,
}

impl TaskContext {
    pub fn new(
        client: Arc<ResilientClient>,
        config: Arc<Config>,
        credentials: Arc<CredentialStore>,
        store: SharedStore,
    ) -> Self {
        Self {
            client,
            config,
            credentials,
            store,
            videos: None,
            images: None,
            clock: Arc::new(TokioClock),
        }
    }

    pub fn with_videos(mut self, videos: SharedVideoLookup) -> Self {
        self.videos = Some(videos);
        self
    }

    pub fn with_images(mut self, images: SharedImageSource) -> Self {
        self.images = Some(images);
        self
    }

    /// Clock used for the inter-chapter throttle
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &dyn ContentStore {
        self.store.as_ref()
    }

    pub fn videos(&self) -> Option<&dyn VideoLookup> {
        self.videos.as_deref()
    }

    pub fn images(&self) -> Option<&dyn ImageSource> {
        self.images.as_deref()
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn client(&self) -> &ResilientClient {
        &self.client
    }

    /// Build the request for `kind` from its configured candidates.
    ///
    /// Task sampling defaults apply only when the prompt sets none of its own.
    pub fn request(&self, kind: TaskKind, prompt: Prompt, shape: OutputShape) -> Result<GenerationRequest> {
        let task = self.config.tasks.get(kind);
        let default_timeout = Duration::from_secs(self.config.generation.timeout_secs);
        let candidates = self.credentials.candidates(task, default_timeout)?;

        let prompt = if prompt.sampling == SamplingParams::default() {
            prompt.with_sampling(task.sampling_params())
        } else {
            prompt
        };
        let max_retries = task.max_retries.unwrap_or(self.config.generation.max_retries);

        Ok(GenerationRequest::new(prompt, candidates, shape)?.with_max_retries(max_retries))
    }

    /// Run one generation for `kind`, mapping exhaustion onto [`crate::types::InsightError`]
    pub async fn generate(&self, kind: TaskKind, prompt: Prompt, shape: OutputShape) -> Result<GenerationSuccess> {
        let request = self.request(kind, prompt, shape)?;
        let outcome = self.client.generate(&request).await;
        debug!(task = %kind, attempts = outcome.attempts().len(), success = outcome.is_success(), "Task generation finished");
        outcome.into_result()
    }
}

/// Reject blank required fields with a 400-style error
pub(crate) fn require<'a>(value: Option<&'a str>, message: &str) -> Result<&'a str> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(crate::types::InsightError::invalid(message)),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::TaskContext;
    use crate::ai::clock::ManualClock;
    use crate::ai::provider::{AttemptResult, Candidate, ProviderAdapter};
    use crate::ai::{Prompt, ResilientClient};
    use crate::config::{Config, CredentialStore, TaskKind};
    use crate::storage::Database;
    use crate::types::{ErrorKind, ProviderFailure};

    /// Replays queued results in order and records every prompt sent
    #[derive(Default)]
    pub struct QueueAdapter {
        responses: Mutex<VecDeque<AttemptResult>>,
        sent: Mutex<Vec<(String, Prompt)>>,
    }

    impl QueueAdapter {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn push_text(&self, text: &str) {
            self.responses.lock().unwrap().push_back(AttemptResult::success(text));
        }

        pub fn push_failure(&self, kind: ErrorKind, message: &str) {
            self.responses
                .lock()
                .unwrap()
                .push_back(ProviderFailure::new(kind, message).into());
        }

        pub fn push_rate_limited(&self, retry_after_secs: u64) {
            self.responses.lock().unwrap().push_back(
                ProviderFailure::new(ErrorKind::RateLimited, "quota exceeded")
                    .with_status(429)
                    .retry_after(retry_after_secs)
                    .into(),
            );
        }

        pub fn sent(&self) -> Vec<(String, Prompt)> {
            self.sent.lock().unwrap().clone()
        }

        pub fn last_prompt(&self) -> Prompt {
            self.sent().last().map(|(_, p)| p.clone()).expect("no prompt sent")
        }
    }

    #[async_trait]
    impl ProviderAdapter for QueueAdapter {
        async fn send(&self, candidate: &Candidate, prompt: &Prompt) -> AttemptResult {
            self.sent.lock().unwrap().push((candidate.model.clone(), prompt.clone()));
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| ProviderFailure::new(ErrorKind::Unknown, "no scripted response").into())
        }
    }

    pub fn test_config() -> Config {
        let mut config = Config::default();
        config.backoff.max_jitter_ms = 0;
        config
    }

    pub fn all_credentials(config: &Config) -> CredentialStore {
        let values: HashMap<String, String> = TaskKind::ALL
            .into_iter()
            .flat_map(|kind| config.tasks.get(kind).candidates.clone())
            .map(|c| (c.credential_env, "test-key".to_string()))
            .collect();
        CredentialStore::from_map(values)
    }

    pub struct Harness {
        pub ctx: TaskContext,
        pub adapter: Arc<QueueAdapter>,
        pub clock: Arc<ManualClock>,
        pub db: Arc<Database>,
    }

    pub fn harness() -> Harness {
        harness_with(test_config())
    }

    pub fn harness_with(config: Config) -> Harness {
        let adapter = QueueAdapter::new();
        let clock = Arc::new(ManualClock::new());
        let client = ResilientClient::new(adapter.clone(), config.client_config()).with_clock(clock.clone());
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.initialize().unwrap();
        let credentials = all_credentials(&config);
        let ctx = TaskContext::new(Arc::new(client), Arc::new(config), Arc::new(credentials), db.clone())
            .with_clock(clock.clone());
        Harness {
            ctx,
            adapter,
            clock,
            db,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_request_applies_task_settings() {
        let h = harness();
        let request = h
            .ctx
            .request(TaskKind::Quiz, Prompt::user("q"), OutputShape::JsonArray)
            .unwrap();

        assert_eq!(request.candidates()[0].model, "google/gemma-3-1b-it");
        assert_eq!(request.prompt().sampling.temperature, Some(0.1));
        assert_eq!(request.prompt().sampling.max_tokens, Some(512));
        assert_eq!(request.max_retries(), 3);
    }

    #[test]
    fn test_request_keeps_explicit_sampling() {
        let h = harness();
        let prompt = Prompt::user("q").with_sampling(SamplingParams::new().temperature(0.9));
        let request = h.ctx.request(TaskKind::Quiz, prompt, OutputShape::RawText).unwrap();
        assert_eq!(request.prompt().sampling.temperature, Some(0.9));
        assert_eq!(request.prompt().sampling.max_tokens, None);
    }

    #[test]
    fn test_request_task_retry_override() {
        let mut config = test_config();
        config.tasks.grammar.max_retries = Some(1);
        let h = harness_with(config);
        let request = h.ctx.request(TaskKind::Grammar, Prompt::user("t"), OutputShape::RawText).unwrap();
        assert_eq!(request.max_retries(), 1);
    }

    #[test]
    fn test_missing_credential_fails_before_network() {
        let config = Arc::new(test_config());
        let h = harness();
        let ctx = TaskContext::new(
            Arc::new(ResilientClient::new(h.adapter.clone(), config.client_config())),
            config,
            Arc::new(CredentialStore::from_map(HashMap::new())),
            h.db.clone(),
        );

        let err = ctx.request(TaskKind::Chat, Prompt::user("hi"), OutputShape::RawText).unwrap_err();
        assert!(matches!(err, crate::types::InsightError::MissingCredential { .. }));
        assert!(h.adapter.sent().is_empty());
    }

    #[test]
    fn test_require_rejects_blank() {
        assert_eq!(require(Some(" a "), "x").unwrap(), "a");
        assert!(require(Some("   "), "x").is_err());
        assert!(require(None, "x").is_err());
    }
}
