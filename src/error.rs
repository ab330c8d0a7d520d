// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Error types for localchat
//!
//! Every variant carries owned strings so an error can be cloned: a single
//! model load failure is delivered to every task waiting on that load, and a
//! session whose materialization failed replays the failure on later turns.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for localchat operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocalChatError {
    /// The runtime could not load the model weights
    #[error("Failed to load model {} ({gpu_layers} GPU layers): {message}", model_path.display())]
    ModelLoad {
        model_path: PathBuf,
        gpu_layers: u32,
        message: String,
    },

    /// Context, sequence or native session construction failed after the
    /// model itself loaded
    #[error("Failed to create session for model {}: {message}", model_path.display())]
    SessionCreation { model_path: PathBuf, message: String },

    /// A native inference call failed mid-turn
    #[error("Prompt failed: {0}")]
    Prompt(String),

    /// The session's native materialization failed earlier and is not retried
    #[error("Session unavailable: {0}")]
    SessionUnavailable(String),

    /// Session bookkeeping errors
    #[error("Session error: {0}")]
    Session(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(String),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(String),
}

impl LocalChatError {
    /// Whether the failure happened while preparing the model or session,
    /// as opposed to during a conversation turn.
    pub fn is_load_time(&self) -> bool {
        matches!(
            self,
            LocalChatError::ModelLoad { .. }
                | LocalChatError::SessionCreation { .. }
                | LocalChatError::SessionUnavailable(_)
        )
    }
}

/// Result type alias for localchat operations
pub type Result<T> = std::result::Result<T, LocalChatError>;

impl From<std::io::Error> for LocalChatError {
    fn from(err: std::io::Error) -> Self {
        LocalChatError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for LocalChatError {
    fn from(err: serde_json::Error) -> Self {
        LocalChatError::Json(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_load_mentions_fingerprint() {
        let err = LocalChatError::ModelLoad {
            model_path: PathBuf::from("/models/qwen.gguf"),
            gpu_layers: 33,
            message: "corrupt header".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("/models/qwen.gguf"));
        assert!(text.contains("33 GPU layers"));
        assert!(text.contains("corrupt header"));
    }

    #[test]
    fn test_session_creation_mentions_path() {
        let err = LocalChatError::SessionCreation {
            model_path: PathBuf::from("/models/qwen.gguf"),
            message: "context too large".to_string(),
        };
        assert!(err.to_string().contains("/models/qwen.gguf"));
        assert!(err.to_string().contains("context too large"));
    }

    #[test]
    fn test_prompt_error() {
        let err = LocalChatError::Prompt("decode failed".to_string());
        assert_eq!(err.to_string(), "Prompt failed: decode failed");
    }

    #[test]
    fn test_load_time_classification() {
        let load = LocalChatError::ModelLoad {
            model_path: PathBuf::from("m.gguf"),
            gpu_layers: 0,
            message: "x".to_string(),
        };
        assert!(load.is_load_time());
        assert!(LocalChatError::SessionUnavailable("x".to_string()).is_load_time());
        assert!(!LocalChatError::Prompt("x".to_string()).is_load_time());
        assert!(!LocalChatError::Config("x".to_string()).is_load_time());
    }

    #[test]
    fn test_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: LocalChatError = io_err.into();
        assert!(err.to_string().contains("IO error"));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: LocalChatError = json_err.into();
        assert!(matches!(err, LocalChatError::Json(_)));
    }

    #[test]
    fn test_clone_preserves_equality() {
        let err = LocalChatError::Prompt("boom".to_string());
        assert_eq!(err.clone(), err);
    }

    #[test]
    fn test_result_error() {
        fn test_fn() -> Result<i32> {
            Err(LocalChatError::InvalidInput("test".to_string()))
        }

        assert!(test_fn().is_err());
    }
}
