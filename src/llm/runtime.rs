// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Inference runtime boundary
//!
//! The traits in this module describe the capabilities localchat needs from a
//! locally hosted model runtime: load a model with some layers offloaded to
//! the GPU, create a context of a given size, take a sequence from it, bind a
//! session to that sequence, and prompt the session. Tokenization and sampling
//! stay behind these traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::error::Result;

/// One entry of a runtime's own chat history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NativeHistoryItem {
    /// System prompt the session was created with
    System { text: String },
    /// User turn, as a single string
    User { text: String },
    /// Model turn; a response may consist of several segments
    Model { response: Vec<String> },
}

/// Generation options forwarded with a prompt. Only set fields are applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_prefix: Option<String>,
}

/// Entry point of an inference runtime
#[async_trait]
pub trait InferenceRuntime: Send + Sync {
    /// Short runtime name for logs
    fn name(&self) -> &str;

    /// Load model weights from `model_path`, offloading `gpu_layers` layers.
    async fn load_model(&self, model_path: &Path, gpu_layers: u32) -> Result<Arc<dyn NativeModel>>;
}

/// A loaded model. Shared by every session created from it.
#[async_trait]
pub trait NativeModel: Send + Sync {
    /// Create an evaluation context holding `context_size` tokens.
    async fn create_context(&self, context_size: u32) -> Result<Box<dyn NativeContext>>;
}

/// An evaluation context created from a model
pub trait NativeContext: Send {
    /// Take an execution sequence from this context.
    fn get_sequence(self: Box<Self>) -> Result<Box<dyn NativeSequence>>;
}

/// An execution sequence that a chat session can be bound to
pub trait NativeSequence: Send {
    /// Bind a new chat session with `system_prompt` to this sequence.
    fn create_session(self: Box<Self>, system_prompt: &str) -> Result<Box<dyn NativeSession>>;
}

/// A runtime-side conversation that performs inference
#[async_trait]
pub trait NativeSession: Send {
    /// Run one turn and return the generated text.
    async fn prompt(&mut self, text: &str, options: Option<&PromptOptions>) -> Result<String>;

    /// The session's current chat history, including items it was
    /// initialized with.
    fn chat_history(&self) -> &[NativeHistoryItem];

    /// Replace the session's chat history.
    fn set_chat_history(&mut self, history: Vec<NativeHistoryItem>);

    /// Drop incremental evaluation state and context-window reuse so the
    /// next prompt evaluates the whole chat history.
    fn invalidate_evaluation_cache(&mut self);
}
