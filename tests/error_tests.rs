// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::io;
use std::path::PathBuf;

use localchat::LocalChatError;

#[test]
fn test_io_error_conversion() {
    let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
    let error: LocalChatError = io_error.into();

    match error {
        LocalChatError::Io(message) => assert!(message.contains("File not found")),
        other => panic!("Expected Io error, got {:?}", other),
    }
}

#[test]
fn test_json_error_conversion() {
    let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let error: LocalChatError = json_error.into();
    assert!(matches!(error, LocalChatError::Json(_)));
}

#[test]
fn test_model_load_display_names_fingerprint() {
    let error = LocalChatError::ModelLoad {
        model_path: PathBuf::from("/models/a.gguf"),
        gpu_layers: 12,
        message: "out of memory".to_string(),
    };
    let display = error.to_string();
    assert!(display.contains("/models/a.gguf"));
    assert!(display.contains("12 GPU layers"));
    assert!(display.contains("out of memory"));
}

#[test]
fn test_load_time_classification() {
    let load = LocalChatError::SessionCreation {
        model_path: PathBuf::from("/m.gguf"),
        message: "context".to_string(),
    };
    assert!(load.is_load_time());
    assert!(LocalChatError::SessionUnavailable("earlier".into()).is_load_time());
    assert!(!LocalChatError::Prompt("decode".into()).is_load_time());
    assert!(!LocalChatError::Config("bad".into()).is_load_time());
}

#[test]
fn test_errors_clone_equal() {
    let error = LocalChatError::Prompt("decode failed".to_string());
    assert_eq!(error.clone(), error);
}
