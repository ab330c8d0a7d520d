// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Local inference runtime using llama.cpp
//!
//! Implements the runtime traits on top of llama-cpp-2 so chat sessions can
//! run GGUF models fully offline.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use localchat::config::LocalModelConfig;
//! use localchat::llm::client::LocalLlmClient;
//! use localchat::llm::providers::LlamaCppRuntime;
//!
//! # fn main() -> localchat::Result<()> {
//! let runtime = LlamaCppRuntime::new()?;
//! let client = LocalLlmClient::new(LocalModelConfig::new("/path/to/model.gguf"), Arc::new(runtime));
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use llama_cpp_2::context::params::LlamaContextParams;
use llama_cpp_2::llama_backend::LlamaBackend;
use llama_cpp_2::llama_batch::LlamaBatch;
use llama_cpp_2::model::params::LlamaModelParams;
use llama_cpp_2::model::{AddBos, LlamaModel, Special};
use llama_cpp_2::sampling::LlamaSampler;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Weak};

use crate::error::{LocalChatError, Result};
use crate::llm::runtime::{
    InferenceRuntime, NativeContext, NativeHistoryItem, NativeModel, NativeSequence,
    NativeSession, PromptOptions,
};

/// Temperature used when the prompt options leave it unset
const DEFAULT_TEMPERATURE: f32 = 0.8;

/// llama.cpp treats this seed as "pick a random seed"
const RANDOM_SEED: u32 = u32::MAX;

const IM_START: &str = "<|im_start|>";
const IM_END: &str = "<|im_end|>";

/// Only one llama.cpp backend may exist per process.
static BACKEND: Mutex<Weak<LlamaBackend>> = Mutex::new(Weak::new());

fn shared_backend() -> Result<Arc<LlamaBackend>> {
    let mut guard = BACKEND
        .lock()
        .map_err(|_| LocalChatError::Config("llama.cpp backend lock poisoned".to_string()))?;
    if let Some(backend) = guard.upgrade() {
        return Ok(backend);
    }
    let backend = LlamaBackend::init().map_err(|e| {
        LocalChatError::Config(format!("Failed to initialize llama.cpp backend: {}", e))
    })?;
    let backend = Arc::new(backend);
    *guard = Arc::downgrade(&backend);
    Ok(backend)
}

/// Inference runtime backed by llama.cpp
pub struct LlamaCppRuntime {
    backend: Arc<LlamaBackend>,
}

impl LlamaCppRuntime {
    /// Create a runtime sharing the process-wide llama.cpp backend
    pub fn new() -> Result<Self> {
        Ok(Self {
            backend: shared_backend()?,
        })
    }
}

#[async_trait]
impl InferenceRuntime for LlamaCppRuntime {
    fn name(&self) -> &str {
        "llama.cpp"
    }

    async fn load_model(&self, model_path: &Path, gpu_layers: u32) -> Result<Arc<dyn NativeModel>> {
        let load_error = |message: String| LocalChatError::ModelLoad {
            model_path: model_path.to_path_buf(),
            gpu_layers,
            message,
        };

        if !model_path.exists() {
            return Err(load_error("model file not found".to_string()));
        }

        let backend = Arc::clone(&self.backend);
        let path = model_path.to_path_buf();
        let model = tokio::task::spawn_blocking(move || {
            let params = LlamaModelParams::default().with_n_gpu_layers(gpu_layers);
            LlamaModel::load_from_file(&backend, &path, &params).map_err(|e| e.to_string())
        })
        .await
        .map_err(|e| load_error(format!("load task failed: {}", e)))?
        .map_err(load_error)?;

        Ok(Arc::new(LlamaCppModel {
            backend: Arc::clone(&self.backend),
            model: Arc::new(model),
            model_path: model_path.to_path_buf(),
        }))
    }
}

struct LlamaCppModel {
    backend: Arc<LlamaBackend>,
    model: Arc<LlamaModel>,
    model_path: PathBuf,
}

#[async_trait]
impl NativeModel for LlamaCppModel {
    async fn create_context(&self, context_size: u32) -> Result<Box<dyn NativeContext>> {
        if context_size == 0 {
            return Err(LocalChatError::SessionCreation {
                model_path: self.model_path.clone(),
                message: "context size must be positive".to_string(),
            });
        }
        Ok(Box::new(LlamaCppContext {
            backend: Arc::clone(&self.backend),
            model: Arc::clone(&self.model),
            context_size,
        }))
    }
}

/// Context parameters; the llama.cpp context itself is created per prompt
/// on a blocking thread because it borrows the model.
struct LlamaCppContext {
    backend: Arc<LlamaBackend>,
    model: Arc<LlamaModel>,
    context_size: u32,
}

impl NativeContext for LlamaCppContext {
    fn get_sequence(self: Box<Self>) -> Result<Box<dyn NativeSequence>> {
        Ok(Box::new(LlamaCppSequence { context: *self }))
    }
}

struct LlamaCppSequence {
    context: LlamaCppContext,
}

impl NativeSequence for LlamaCppSequence {
    fn create_session(self: Box<Self>, system_prompt: &str) -> Result<Box<dyn NativeSession>> {
        let mut history = Vec::new();
        if !system_prompt.is_empty() {
            history.push(NativeHistoryItem::System {
                text: system_prompt.to_string(),
            });
        }
        Ok(Box::new(LlamaCppSession {
            context: self.context,
            history,
            transcript: None,
        }))
    }
}

struct LlamaCppSession {
    context: LlamaCppContext,
    history: Vec<NativeHistoryItem>,
    /// Rendered transcript up to the end of the last evaluated turn
    transcript: Option<String>,
}

impl LlamaCppSession {
    fn render_prompt(&self, text: &str, prefix: &str) -> String {
        let mut prompt = match &self.transcript {
            Some(transcript) => transcript.clone(),
            None => render_history(&self.history),
        };
        push_turn(&mut prompt, "user", text);
        prompt.push_str(IM_START);
        prompt.push_str("assistant\n");
        prompt.push_str(prefix);
        prompt
    }
}

#[async_trait]
impl NativeSession for LlamaCppSession {
    async fn prompt(&mut self, text: &str, options: Option<&PromptOptions>) -> Result<String> {
        let options = options.cloned().unwrap_or_default();
        let prefix = options.response_prefix.clone().unwrap_or_default();
        let prompt = self.render_prompt(text, &prefix);

        let backend = Arc::clone(&self.context.backend);
        let model = Arc::clone(&self.context.model);
        let context_size = self.context.context_size;
        let prompt_clone = prompt.clone();

        let output = tokio::task::spawn_blocking(move || {
            generate(&backend, &model, context_size, &prompt_clone, &options)
        })
        .await
        .map_err(|e| LocalChatError::Prompt(format!("Inference task failed: {}", e)))??;

        let response = format!("{}{}", prefix, output);
        self.history.push(NativeHistoryItem::User {
            text: text.to_string(),
        });
        self.history.push(NativeHistoryItem::Model {
            response: vec![response.clone()],
        });
        self.transcript = Some(format!("{}{}{}\n", prompt, output, IM_END));

        Ok(response)
    }

    fn chat_history(&self) -> &[NativeHistoryItem] {
        &self.history
    }

    fn set_chat_history(&mut self, history: Vec<NativeHistoryItem>) {
        self.history = history;
    }

    fn invalidate_evaluation_cache(&mut self) {
        self.transcript = None;
    }
}

/// Render native history in ChatML format
fn render_history(history: &[NativeHistoryItem]) -> String {
    let mut prompt = String::new();
    for item in history {
        match item {
            NativeHistoryItem::System { text } => push_turn(&mut prompt, "system", text),
            NativeHistoryItem::User { text } => push_turn(&mut prompt, "user", text),
            NativeHistoryItem::Model { response } => {
                push_turn(&mut prompt, "assistant", &response.concat())
            }
        }
    }
    prompt
}

fn push_turn(prompt: &mut String, role: &str, text: &str) {
    prompt.push_str(IM_START);
    prompt.push_str(role);
    prompt.push('\n');
    prompt.push_str(text);
    prompt.push_str(IM_END);
    prompt.push('\n');
}

/// llama.cpp takes `top_k` as an `i32`; larger values saturate.
fn clamp_top_k(top_k: u32) -> i32 {
    i32::try_from(top_k).unwrap_or(i32::MAX)
}

fn build_sampler(options: &PromptOptions) -> LlamaSampler {
    let mut samplers = Vec::new();
    if let Some(top_k) = options.top_k {
        samplers.push(LlamaSampler::top_k(clamp_top_k(top_k)));
    }
    if let Some(top_p) = options.top_p {
        samplers.push(LlamaSampler::top_p(top_p, 1));
    }
    if let Some(min_p) = options.min_p {
        samplers.push(LlamaSampler::min_p(min_p, 1));
    }
    samplers.push(LlamaSampler::temp(
        options.temperature.unwrap_or(DEFAULT_TEMPERATURE),
    ));
    samplers.push(LlamaSampler::dist(options.seed.unwrap_or(RANDOM_SEED)));
    LlamaSampler::chain_simple(samplers)
}

/// Generate a completion for `prompt` in a fresh llama.cpp context
fn generate(
    backend: &LlamaBackend,
    model: &LlamaModel,
    context_size: u32,
    prompt: &str,
    options: &PromptOptions,
) -> Result<String> {
    let ctx_params = LlamaContextParams::default().with_n_ctx(NonZeroU32::new(context_size));
    let mut ctx = model
        .new_context(backend, ctx_params)
        .map_err(|e| LocalChatError::Prompt(format!("Failed to create context: {}", e)))?;

    let tokens = model
        .str_to_token(prompt, AddBos::Always)
        .map_err(|e| LocalChatError::Prompt(format!("Failed to tokenize prompt: {}", e)))?;

    let budget = (context_size as usize).saturating_sub(tokens.len());
    if budget == 0 {
        return Err(LocalChatError::Prompt(format!(
            "Prompt of {} tokens does not fit a context of {}",
            tokens.len(),
            context_size
        )));
    }
    let max_tokens = options
        .max_tokens
        .map(|m| (m as usize).min(budget))
        .unwrap_or(budget);

    let mut batch = LlamaBatch::new(context_size as usize, 1);
    for (i, token) in tokens.iter().enumerate() {
        let is_last = i == tokens.len() - 1;
        batch
            .add(*token, i as i32, &[0], is_last)
            .map_err(|e| LocalChatError::Prompt(format!("Failed to add token to batch: {}", e)))?;
    }
    ctx.decode(&mut batch)
        .map_err(|e| LocalChatError::Prompt(format!("Failed to decode batch: {}", e)))?;

    let mut sampler = build_sampler(options);
    let mut output = String::new();
    let mut n_cur = tokens.len();

    for _ in 0..max_tokens {
        let token = sampler.sample(&ctx, batch.n_tokens() - 1);
        sampler.accept(token);

        if model.is_eog_token(token) {
            break;
        }

        let piece = model
            .token_to_str(token, Special::Tokenize)
            .map_err(|e| LocalChatError::Prompt(format!("Failed to decode token: {}", e)))?;
        output.push_str(&piece);

        batch.clear();
        batch
            .add(token, n_cur as i32, &[0], true)
            .map_err(|e| LocalChatError::Prompt(format!("Failed to add token: {}", e)))?;
        ctx.decode(&mut batch)
            .map_err(|e| LocalChatError::Prompt(format!("Failed to decode: {}", e)))?;
        n_cur += 1;
    }

    Ok(output.trim_end_matches(IM_END).trim_end().to_string())
}
