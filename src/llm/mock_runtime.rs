// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Mock inference runtime for testing
//!
//! Provides a scriptable implementation of the runtime traits that can be
//! used in unit and integration tests without model weights. It counts model
//! loads, records every prompt together with the native history the session
//! held at that moment, and can be told to fail loads, session creation or
//! prompts.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::error::{LocalChatError, Result};
use crate::llm::runtime::{
    InferenceRuntime, NativeContext, NativeHistoryItem, NativeModel, NativeSequence,
    NativeSession, PromptOptions,
};

/// A mock runtime for testing
#[derive(Clone, Default)]
pub struct MockRuntime {
    state: Arc<MockState>,
}

#[derive(Default)]
struct MockState {
    load_calls: AtomicUsize,
    load_delay: Mutex<Option<Duration>>,
    failing_loads: AtomicUsize,
    fail_session_creation: AtomicBool,
    failing_prompts: AtomicUsize,
    responses: Mutex<Vec<String>>,
    prompt_count: AtomicUsize,
    recorded_prompts: Mutex<Vec<RecordedPrompt>>,
    context_sizes: Mutex<Vec<u32>>,
    sessions_created: AtomicUsize,
}

/// A prompt observed by a mock session
#[derive(Debug, Clone)]
pub struct RecordedPrompt {
    /// System prompt of the session that was prompted
    pub system_prompt: String,
    /// Prompt text
    pub text: String,
    /// Options passed with the prompt
    pub options: Option<PromptOptions>,
    /// Native history before this turn was added
    pub history: Vec<NativeHistoryItem>,
    /// How many times the session's evaluation cache had been invalidated
    pub invalidations: usize,
}

impl MockRuntime {
    /// Create a new mock runtime answering "Mock response"
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every prompt with `text`
    pub fn with_response(self, text: impl Into<String>) -> Self {
        *lock(&self.state.responses) = vec![text.into()];
        self
    }

    /// Queue multiple responses (returned in order, the last one repeats)
    pub fn with_responses(self, texts: Vec<String>) -> Self {
        *lock(&self.state.responses) = texts;
        self
    }

    /// Make every model load take `delay`
    pub fn with_load_delay(self, delay: Duration) -> Self {
        *lock(&self.state.load_delay) = Some(delay);
        self
    }

    /// Fail the next `count` model loads
    pub fn failing_loads(self, count: usize) -> Self {
        self.state.failing_loads.store(count, Ordering::SeqCst);
        self
    }

    /// Fail every context creation
    pub fn failing_session_creation(self) -> Self {
        self.state
            .fail_session_creation
            .store(true, Ordering::SeqCst);
        self
    }

    /// Fail the next `count` prompts
    pub fn failing_prompts(self, count: usize) -> Self {
        self.state.failing_prompts.store(count, Ordering::SeqCst);
        self
    }

    /// Number of times `load_model` was called
    pub fn load_calls(&self) -> usize {
        self.state.load_calls.load(Ordering::SeqCst)
    }

    /// Number of native sessions created
    pub fn sessions_created(&self) -> usize {
        self.state.sessions_created.load(Ordering::SeqCst)
    }

    /// Context sizes requested, in order
    pub fn context_sizes(&self) -> Vec<u32> {
        lock(&self.state.context_sizes).clone()
    }

    /// Get all recorded prompts
    pub fn recorded_prompts(&self) -> Vec<RecordedPrompt> {
        lock(&self.state.recorded_prompts).clone()
    }

    /// Get the last prompt made
    pub fn last_prompt(&self) -> Option<RecordedPrompt> {
        lock(&self.state.recorded_prompts).last().cloned()
    }
}

impl MockState {
    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn next_response(&self) -> String {
        let count = self.prompt_count.fetch_add(1, Ordering::SeqCst);
        let responses = lock(&self.responses);
        // Cycle through responses or return the last one
        if responses.is_empty() {
            "Mock response".to_string()
        } else {
            responses[count.min(responses.len() - 1)].clone()
        }
    }
}

#[async_trait]
impl InferenceRuntime for MockRuntime {
    fn name(&self) -> &str {
        "mock"
    }

    async fn load_model(&self, model_path: &Path, gpu_layers: u32) -> Result<Arc<dyn NativeModel>> {
        self.state.load_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *lock(&self.state.load_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if MockState::take_failure(&self.state.failing_loads) {
            return Err(LocalChatError::ModelLoad {
                model_path: model_path.to_path_buf(),
                gpu_layers,
                message: "mock load failure".to_string(),
            });
        }

        Ok(Arc::new(MockModel {
            state: self.state.clone(),
            model_path: model_path.to_path_buf(),
        }))
    }
}

struct MockModel {
    state: Arc<MockState>,
    model_path: PathBuf,
}

#[async_trait]
impl NativeModel for MockModel {
    async fn create_context(&self, context_size: u32) -> Result<Box<dyn NativeContext>> {
        if self.state.fail_session_creation.load(Ordering::SeqCst) {
            return Err(LocalChatError::SessionCreation {
                model_path: self.model_path.clone(),
                message: "mock context failure".to_string(),
            });
        }
        lock(&self.state.context_sizes).push(context_size);
        Ok(Box::new(MockContext {
            state: self.state.clone(),
        }))
    }
}

struct MockContext {
    state: Arc<MockState>,
}

impl NativeContext for MockContext {
    fn get_sequence(self: Box<Self>) -> Result<Box<dyn NativeSequence>> {
        Ok(Box::new(MockSequence { state: self.state }))
    }
}

struct MockSequence {
    state: Arc<MockState>,
}

impl NativeSequence for MockSequence {
    fn create_session(self: Box<Self>, system_prompt: &str) -> Result<Box<dyn NativeSession>> {
        self.state.sessions_created.fetch_add(1, Ordering::SeqCst);
        let mut session = MockSession::new(system_prompt);
        session.state = Some(self.state);
        Ok(Box::new(session))
    }
}

/// A mock native session. Starts with a system item, like a real runtime
/// that seeds its history with the system prompt.
pub struct MockSession {
    system_prompt: String,
    history: Vec<NativeHistoryItem>,
    invalidations: usize,
    state: Option<Arc<MockState>>,
}

impl MockSession {
    /// Standalone session not attached to a runtime
    pub fn new(system_prompt: &str) -> Self {
        Self {
            system_prompt: system_prompt.to_string(),
            history: vec![NativeHistoryItem::System {
                text: system_prompt.to_string(),
            }],
            invalidations: 0,
            state: None,
        }
    }

    /// How many times the evaluation cache was invalidated
    pub fn invalidations(&self) -> usize {
        self.invalidations
    }
}

#[async_trait]
impl NativeSession for MockSession {
    async fn prompt(&mut self, text: &str, options: Option<&PromptOptions>) -> Result<String> {
        let response = match &self.state {
            Some(state) => {
                lock(&state.recorded_prompts).push(RecordedPrompt {
                    system_prompt: self.system_prompt.clone(),
                    text: text.to_string(),
                    options: options.cloned(),
                    history: self.history.clone(),
                    invalidations: self.invalidations,
                });
                if MockState::take_failure(&state.failing_prompts) {
                    return Err(LocalChatError::Prompt("mock prompt failure".to_string()));
                }
                state.next_response()
            }
            None => "Mock response".to_string(),
        };

        self.history.push(NativeHistoryItem::User {
            text: text.to_string(),
        });
        self.history.push(NativeHistoryItem::Model {
            response: vec![response.clone()],
        });
        Ok(response)
    }

    fn chat_history(&self) -> &[NativeHistoryItem] {
        &self.history
    }

    fn set_chat_history(&mut self, history: Vec<NativeHistoryItem>) {
        self.history = history;
    }

    fn invalidate_evaluation_cache(&mut self) {
        self.invalidations += 1;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("Mock runtime lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_runtime_full_chain() {
        let runtime = MockRuntime::new().with_response("pong");
        let model = runtime.load_model(Path::new("m.gguf"), 0).await.unwrap();
        let context = model.create_context(2048).await.unwrap();
        let sequence = context.get_sequence().unwrap();
        let mut session = sequence.create_session("sys").unwrap();

        let reply = session.prompt("ping", None).await.unwrap();

        assert_eq!(reply, "pong");
        assert_eq!(runtime.load_calls(), 1);
        assert_eq!(runtime.sessions_created(), 1);
        assert_eq!(runtime.context_sizes(), vec![2048]);
        assert_eq!(session.chat_history().len(), 3);
        assert_eq!(runtime.last_prompt().unwrap().text, "ping");
    }

    #[tokio::test]
    async fn test_mock_runtime_cycles_responses() {
        let runtime = MockRuntime::new().with_responses(vec!["one".into(), "two".into()]);
        let model = runtime.load_model(Path::new("m.gguf"), 0).await.unwrap();
        let sequence = model.create_context(512).await.unwrap().get_sequence().unwrap();
        let mut session = sequence.create_session("").unwrap();

        assert_eq!(session.prompt("a", None).await.unwrap(), "one");
        assert_eq!(session.prompt("b", None).await.unwrap(), "two");
        assert_eq!(session.prompt("c", None).await.unwrap(), "two");
    }

    #[tokio::test]
    async fn test_mock_runtime_failing_loads_then_recovers() {
        let runtime = MockRuntime::new().failing_loads(1);
        assert!(runtime.load_model(Path::new("m.gguf"), 0).await.is_err());
        assert!(runtime.load_model(Path::new("m.gguf"), 0).await.is_ok());
        assert_eq!(runtime.load_calls(), 2);
    }

    #[tokio::test]
    async fn test_mock_prompt_failure_leaves_native_history() {
        let runtime = MockRuntime::new().failing_prompts(1);
        let model = runtime.load_model(Path::new("m.gguf"), 0).await.unwrap();
        let sequence = model.create_context(512).await.unwrap().get_sequence().unwrap();
        let mut session = sequence.create_session("sys").unwrap();

        assert!(session.prompt("x", None).await.is_err());
        assert_eq!(session.chat_history().len(), 1);
    }
}
