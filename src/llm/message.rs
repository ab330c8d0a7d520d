// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Message types for conversations
//!
//! Defines the runtime-independent conversation format. A message is a role
//! plus an ordered list of text parts; a history is an ordered list of
//! messages where insertion order is turn order.

use serde::{Deserialize, Serialize};

/// Role of the message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User message
    User,
    /// Model response
    Model,
}

/// A single text segment of a message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Part {
    pub text: String,
}

/// A message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Role of the message sender
    pub role: Role,

    /// Text segments, in order
    pub parts: Vec<Part>,
}

/// Ordered conversation; index order is turn order.
pub type ConversationHistory = Vec<Message>;

impl Part {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl Message {
    /// Create a new user message with a single part
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::new(text)],
        }
    }

    /// Create a new model message with a single part
    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            parts: vec![Part::new(text)],
        }
    }

    /// Create a message from several text parts
    pub fn with_parts<I, S>(role: Role, parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            role,
            parts: parts.into_iter().map(Part::new).collect(),
        }
    }

    /// All parts concatenated in order, without a separator
    pub fn text(&self) -> String {
        self.parts.iter().map(|p| p.text.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_user_creation() {
        let message = Message::user("Hello, world!");
        assert_eq!(message.role, Role::User);
        assert_eq!(message.parts, vec![Part::new("Hello, world!")]);
    }

    #[test]
    fn test_message_model_creation() {
        let message = Message::model("I can help with that.");
        assert_eq!(message.role, Role::Model);
        assert_eq!(message.text(), "I can help with that.");
    }

    #[test]
    fn test_text_concatenates_without_separator() {
        let message = Message::with_parts(Role::User, ["Hel", "lo", " there"]);
        assert_eq!(message.text(), "Hello there");
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(serde_json::to_string(&Role::Model).unwrap(), "\"model\"");
    }

    #[test]
    fn test_message_json_shape() {
        let json = serde_json::to_value(Message::user("hi")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"role": "user", "parts": [{"text": "hi"}]})
        );
    }
}
