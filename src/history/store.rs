// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Session store implementation
//!
//! Stores one pretty-printed JSON file per session, named `<id>.json`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::config::Settings;
use crate::error::{LocalChatError, Result};
use crate::llm::message::ConversationHistory;

/// A saved chat session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionRecord {
    /// Session ID
    pub id: Uuid,
    /// System instruction the session was created with
    pub system_instruction: String,
    /// Name of the model that produced the responses
    pub model_name: String,
    /// Short title, usually derived from the first user message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// When the session started
    pub created_at: DateTime<Utc>,
    /// When the session was last saved
    pub updated_at: DateTime<Utc>,
    /// Completed turns
    #[serde(default)]
    pub messages: ConversationHistory,
}

impl SessionRecord {
    /// Whether the record holds at least one complete exchange
    pub fn has_exchange(&self) -> bool {
        self.messages.len() >= 2
    }
}

/// Directory-backed store of saved sessions
pub struct SessionStore {
    root: PathBuf,
}

impl SessionStore {
    /// Open the store at the default sessions directory
    pub fn open() -> Result<Self> {
        Self::open_at(Settings::sessions_dir())
    }

    /// Open or create a store rooted at `root`
    pub fn open_at(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: Uuid) -> PathBuf {
        self.root.join(format!("{}.json", id))
    }

    /// Save a session. Sessions without a complete exchange are skipped and
    /// `Ok(false)` is returned.
    pub fn save(&self, record: &SessionRecord) -> Result<bool> {
        if !record.has_exchange() {
            tracing::debug!(session_id = %record.id, "Skipping save of empty session");
            return Ok(false);
        }
        let content = serde_json::to_string_pretty(record)?;
        std::fs::write(self.path_for(record.id), content)?;
        Ok(true)
    }

    /// Load a session by ID
    pub fn load(&self, id: Uuid) -> Result<SessionRecord> {
        let path = self.path_for(id);
        if !path.exists() {
            return Err(LocalChatError::Session(format!("Session {} not found", id)));
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// List saved sessions, most recently updated first. Unreadable files
    /// are skipped with a warning.
    pub fn list(&self) -> Result<Vec<SessionRecord>> {
        let mut records = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let parsed = std::fs::read_to_string(&path)
                .map_err(LocalChatError::from)
                .and_then(|c| serde_json::from_str::<SessionRecord>(&c).map_err(Into::into));
            match parsed {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable session file")
                }
            }
        }
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(records)
    }

    /// Delete a saved session. Returns false if it did not exist.
    pub fn delete(&self, id: Uuid) -> Result<bool> {
        let path = self.path_for(id);
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(path)?;
        Ok(true)
    }
}
