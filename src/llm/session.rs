// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Chat sessions
//!
//! A [`ChatSession`] keeps its own conversation history and one native
//! session. The native session is materialized by a background task spawned
//! when the chat session is created; the first turn awaits that task and the
//! result is reused for every later turn. A failed materialization is final
//! for the instance: later turns report [`LocalChatError::SessionUnavailable`]
//! until the history is reset with [`ChatSession::clear_history`] or
//! [`ChatSession::pop_last_exchange`], or a new session is created.
//!
//! `send_message` takes `&mut self`, so turns on one session cannot overlap.

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::{LocalChatError, Result};
use crate::history::SessionRecord;
use crate::llm::client::{estimate_tokens, LocalLlmClient};
use crate::llm::message::{ConversationHistory, Message, Role};
use crate::llm::runtime::NativeSession;

/// Maximum title length derived from the first user message
const TITLE_MAX_CHARS: usize = 60;

type Materialization = JoinHandle<Result<Box<dyn NativeSession>>>;

enum NativeState {
    Pending(Materialization),
    Ready(Box<dyn NativeSession>),
    Failed(LocalChatError),
}

/// Observable lifecycle of the native session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Materialization has not been awaited yet
    Pending,
    /// Native session available
    Ready,
    /// Materialization failed
    Failed,
}

/// Token usage summary of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenInfo {
    /// Estimated tokens in the history
    pub total: usize,
    /// Tokens left in the configured budget
    pub remaining: usize,
    /// Configured budget
    pub max: usize,
}

/// A conversation with a local model
pub struct ChatSession {
    id: Uuid,
    client: LocalLlmClient,
    system_instruction: String,
    history: ConversationHistory,
    title: Option<String>,
    created_at: DateTime<Utc>,
    native: NativeState,
}

impl ChatSession {
    pub(crate) fn start(
        client: LocalLlmClient,
        id: Uuid,
        system_instruction: String,
        history: ConversationHistory,
        title: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let native = NativeState::Pending(spawn_materialization(
            &client,
            &system_instruction,
            &history,
        ));
        Self {
            id,
            client,
            system_instruction,
            history,
            title,
            created_at,
            native,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.id
    }

    pub fn system_instruction(&self) -> &str {
        &self.system_instruction
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Set the session title. Blank titles are rejected.
    pub fn set_title(&mut self, title: &str) -> Result<()> {
        let title = title.trim();
        if title.is_empty() {
            return Err(LocalChatError::InvalidInput(
                "Title cannot be empty".to_string(),
            ));
        }
        self.title = Some(title.to_string());
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        match self.native {
            NativeState::Pending(_) => SessionState::Pending,
            NativeState::Ready(_) => SessionState::Ready,
            NativeState::Failed(_) => SessionState::Failed,
        }
    }

    /// Wait for the background materialization to finish
    pub async fn wait_ready(&mut self) -> Result<()> {
        self.native_session().await.map(|_| ())
    }

    /// Send one user turn and return the model's reply.
    ///
    /// Both messages are appended to the history only after the native
    /// prompt succeeds.
    pub async fn send_message(&mut self, text: &str) -> Result<String> {
        let options = self.client.compute_prompt_options();
        let session = self.native_session().await?;

        let response = session
            .prompt(text, options.as_ref())
            .await
            .map_err(|e| match e {
                LocalChatError::Prompt(_) => e,
                other => LocalChatError::Prompt(other.to_string()),
            })?;

        if self.title.is_none() && self.history.is_empty() {
            self.title = derive_title(text);
        }
        self.history.push(Message::user(text));
        self.history.push(Message::model(response.clone()));
        Ok(response)
    }

    /// Completed turns in chronological order
    pub fn get_history(&self) -> &[Message] {
        &self.history
    }

    /// True while the history holds no complete exchange
    pub fn is_empty(&self) -> bool {
        self.history.len() < 2
    }

    /// Estimated token usage against the configured context budget
    pub fn token_info(&self) -> TokenInfo {
        let total = estimate_tokens(&self.history);
        let max = self.client.config().max_context_tokens as usize;
        TokenInfo {
            total,
            remaining: max.saturating_sub(total),
            max,
        }
    }

    /// Drop all history and start a fresh native session
    pub fn clear_history(&mut self) {
        self.history.clear();
        self.rematerialize();
    }

    /// Remove the last user/model exchange. The native session is rebuilt
    /// from the remaining history. Returns false if no full exchange exists.
    pub fn pop_last_exchange(&mut self) -> bool {
        let len = self.history.len();
        if len < 2 {
            return false;
        }
        let tail = &self.history[len - 2..];
        if tail[0].role != Role::User || tail[1].role != Role::Model {
            return false;
        }
        self.history.truncate(len - 2);
        self.rematerialize();
        true
    }

    /// Replace the system instruction and rebuild the native session with
    /// the current history
    pub fn set_system_instruction(&mut self, system_instruction: impl Into<String>) {
        self.system_instruction = system_instruction.into();
        self.rematerialize();
    }

    /// Snapshot for persistence
    pub fn to_record(&self) -> SessionRecord {
        SessionRecord {
            id: self.id,
            system_instruction: self.system_instruction.clone(),
            model_name: self.client.model_name().to_string(),
            title: self.title.clone(),
            created_at: self.created_at,
            updated_at: Utc::now(),
            messages: self.history.clone(),
        }
    }

    async fn native_session(&mut self) -> Result<&mut Box<dyn NativeSession>> {
        if let NativeState::Pending(handle) = &mut self.native {
            let outcome = match handle.await {
                Ok(result) => result,
                Err(e) => Err(LocalChatError::SessionCreation {
                    model_path: self.client.config().model_path.clone(),
                    message: format!("materialization task failed: {}", e),
                }),
            };
            match outcome {
                Ok(session) => self.native = NativeState::Ready(session),
                Err(e) => {
                    tracing::warn!(session_id = %self.id, error = %e, "Native session unavailable");
                    self.native = NativeState::Failed(e.clone());
                    return Err(e);
                }
            }
        }

        match &mut self.native {
            NativeState::Ready(session) => Ok(session),
            NativeState::Failed(e) => Err(LocalChatError::SessionUnavailable(e.to_string())),
            NativeState::Pending(_) => Err(LocalChatError::Session(
                "native session still pending".to_string(),
            )),
        }
    }

    fn rematerialize(&mut self) {
        if let NativeState::Pending(handle) = &self.native {
            handle.abort();
        }
        self.native = NativeState::Pending(spawn_materialization(
            &self.client,
            &self.system_instruction,
            &self.history,
        ));
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        if let NativeState::Pending(handle) = &self.native {
            handle.abort();
        }
    }
}

fn spawn_materialization(
    client: &LocalLlmClient,
    system_instruction: &str,
    history: &[Message],
) -> Materialization {
    let client = client.clone();
    let system_instruction = system_instruction.to_string();
    let history = history.to_vec();
    tokio::spawn(async move {
        client
            .create_native_session(&system_instruction, &history)
            .await
    })
}

fn derive_title(text: &str) -> Option<String> {
    let title: String = text
        .trim()
        .chars()
        .take(TITLE_MAX_CHARS)
        .map(|c| if c == '\n' { ' ' } else { c })
        .collect();
    if title.is_empty() {
        None
    } else {
        Some(title)
    }
}
