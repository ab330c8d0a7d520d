// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Client for a locally hosted model
//!
//! The client owns the resolved model configuration and creates chat
//! sessions. Model weights are obtained through a [`ModelCache`] keyed by
//! `(model path, GPU layers)`, so every session sharing that pair shares one
//! loaded model.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use localchat::config::LocalModelConfig;
//! use localchat::llm::client::LocalLlmClient;
//! use localchat::llm::mock_runtime::MockRuntime;
//!
//! # async fn run() -> localchat::Result<()> {
//! let config = LocalModelConfig::new("/models/qwen2.5-3b.gguf").with_gpu_layers(20);
//! let client = LocalLlmClient::new(config, Arc::new(MockRuntime::new()));
//! let mut session = client.create_chat_session("You are a helpful assistant.", None);
//! let reply = session.send_message("Hello!").await?;
//! # Ok(())
//! # }
//! ```
//!
//! [`ModelCache`]: crate::llm::model_cache::ModelCache

use std::path::Path;
use std::sync::Arc;

use crate::config::LocalModelConfig;
use crate::error::{LocalChatError, Result};
use crate::history::SessionRecord;
use crate::llm::history::hydrate_native_history;
use crate::llm::message::{ConversationHistory, Message};
use crate::llm::model_cache::{process_cache, Fingerprint, NativeModelCache};
use crate::llm::runtime::{InferenceRuntime, NativeModel, NativeSession, PromptOptions};
use crate::llm::session::ChatSession;

/// Characters per token used by [`estimate_tokens`]
const CHARS_PER_TOKEN: usize = 4;

/// Client presenting chat sessions over a local inference runtime
#[derive(Clone)]
pub struct LocalLlmClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: LocalModelConfig,
    runtime: Arc<dyn InferenceRuntime>,
    cache: Arc<NativeModelCache>,
}

impl LocalLlmClient {
    /// Create a client backed by the process-wide model cache
    pub fn new(config: LocalModelConfig, runtime: Arc<dyn InferenceRuntime>) -> Self {
        Self::with_cache(config, runtime, process_cache())
    }

    /// Create a client backed by the given model cache
    pub fn with_cache(
        config: LocalModelConfig,
        runtime: Arc<dyn InferenceRuntime>,
        cache: Arc<NativeModelCache>,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                config,
                runtime,
                cache,
            }),
        }
    }

    /// The resolved configuration
    pub fn config(&self) -> &LocalModelConfig {
        &self.inner.config
    }

    pub fn model_name(&self) -> &str {
        &self.inner.config.model_name
    }

    /// Cache key for this client's model
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::new(
            self.inner.config.model_path.clone(),
            self.inner.config.gpu_layers,
        )
    }

    /// Whether a model path is configured
    pub fn is_ready(&self) -> bool {
        !self.inner.config.model_path.as_os_str().is_empty()
    }

    /// Status line shown while the model is being prepared
    pub fn preparing_message(&self) -> String {
        let config = &self.inner.config;
        format!(
            "Preparing local model {} ({} GPU layers, context {} tokens)...",
            config.model_name, config.gpu_layers, config.context_size
        )
    }

    /// Status line shown once the client is usable
    pub fn ready_message(&self) -> String {
        let config = &self.inner.config;
        format!(
            "Local model {} ready ({} GPU layers, context {} tokens)",
            config.model_name, config.gpu_layers, config.context_size
        )
    }

    /// Create a chat session.
    ///
    /// Returns immediately; loading the model and creating the native
    /// session start in the background on the current Tokio runtime and are
    /// awaited by the first [`ChatSession::send_message`].
    pub fn create_chat_session(
        &self,
        system_instruction: impl Into<String>,
        initial_history: Option<ConversationHistory>,
    ) -> ChatSession {
        ChatSession::start(
            self.clone(),
            uuid::Uuid::new_v4(),
            system_instruction.into(),
            initial_history.unwrap_or_default(),
            None,
            chrono::Utc::now(),
        )
    }

    /// Re-create a saved session, hydrating it with the stored history
    pub fn resume_chat_session(&self, record: SessionRecord) -> ChatSession {
        ChatSession::start(
            self.clone(),
            record.id,
            record.system_instruction,
            record.messages,
            record.title,
            record.created_at,
        )
    }

    /// Generation options to send with each prompt.
    ///
    /// Only fields that are set and finite are included; a prefix must be
    /// non-blank. Returns `None` when nothing applies so the runtime keeps
    /// its own defaults.
    pub fn compute_prompt_options(&self) -> Option<PromptOptions> {
        let generation = &self.inner.config.generation;
        let options = PromptOptions {
            temperature: generation.temperature.filter(|v| v.is_finite()),
            top_p: generation.top_p.filter(|v| v.is_finite()),
            top_k: generation.top_k,
            min_p: generation.min_p.filter(|v| v.is_finite()),
            max_tokens: generation.max_tokens,
            seed: generation.seed,
            response_prefix: generation
                .response_prefix
                .clone()
                .filter(|p| !p.trim().is_empty()),
        };

        if options == PromptOptions::default() {
            None
        } else {
            Some(options)
        }
    }

    /// Approximate token count of a history. See [`estimate_tokens`].
    pub fn estimate_history_tokens(&self, history: &[Message]) -> usize {
        estimate_tokens(history)
    }

    /// Load (or reuse) the model, create a context and sequence, bind a
    /// native session with `system_instruction`, and hydrate it with
    /// `history` when that is non-empty.
    pub(crate) async fn create_native_session(
        &self,
        system_instruction: &str,
        history: &[Message],
    ) -> Result<Box<dyn NativeSession>> {
        let model = self.acquire_model().await?;
        let config = &self.inner.config;
        let model_path = config.model_path.as_path();

        let context = model
            .create_context(config.context_size)
            .await
            .map_err(|e| session_creation_error(model_path, e))?;
        let sequence = context
            .get_sequence()
            .map_err(|e| session_creation_error(model_path, e))?;
        let mut session = sequence
            .create_session(system_instruction)
            .map_err(|e| session_creation_error(model_path, e))?;

        if !history.is_empty() {
            hydrate_native_history(session.as_mut(), history);
        }

        tracing::debug!(
            model_path = %model_path.display(),
            context_size = config.context_size,
            hydrated = history.len(),
            "Native session created"
        );
        Ok(session)
    }

    async fn acquire_model(&self) -> Result<Arc<dyn NativeModel>> {
        let fingerprint = self.fingerprint();
        let runtime = self.inner.runtime.clone();
        let model_path = fingerprint.model_path.clone();
        let gpu_layers = fingerprint.gpu_layers;

        self.inner
            .cache
            .acquire(&fingerprint, move || async move {
                tracing::info!(
                    runtime = runtime.name(),
                    model_path = %model_path.display(),
                    gpu_layers,
                    "Loading model"
                );
                runtime
                    .load_model(&model_path, gpu_layers)
                    .await
                    .map_err(|e| model_load_error(&model_path, gpu_layers, e))
            })
            .await
    }
}

/// Approximate token count: for every text part, its character count
/// divided by four, rounded up, summed over the history.
///
/// This is a heuristic for budgeting, not a tokenizer.
pub fn estimate_tokens(history: &[Message]) -> usize {
    history
        .iter()
        .flat_map(|m| m.parts.iter())
        .map(|p| p.text.chars().count().div_ceil(CHARS_PER_TOKEN))
        .sum()
}

fn model_load_error(model_path: &Path, gpu_layers: u32, err: LocalChatError) -> LocalChatError {
    match err {
        LocalChatError::ModelLoad { .. } => err,
        other => LocalChatError::ModelLoad {
            model_path: model_path.to_path_buf(),
            gpu_layers,
            message: other.to_string(),
        },
    }
}

fn session_creation_error(model_path: &Path, err: LocalChatError) -> LocalChatError {
    match err {
        LocalChatError::SessionCreation { .. } => err,
        other => LocalChatError::SessionCreation {
            model_path: model_path.to_path_buf(),
            message: other.to_string(),
        },
    }
}
