// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Settings management for localchat
//!
//! Handles loading and saving settings from ~/.localchat/settings.json

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

mod env;
mod io;

/// Main settings structure, stored in ~/.localchat/settings.json
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Local model configuration
    #[serde(default)]
    pub local: LocalModelConfig,

    /// Session persistence settings
    #[serde(default)]
    pub sessions: SessionsConfig,
}

/// Resolved configuration of the locally hosted model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalModelConfig {
    /// Display name used in status messages and session records
    #[serde(default = "default_model_name")]
    pub model_name: String,

    /// Path to the GGUF model file (empty = not configured)
    #[serde(default)]
    pub model_path: PathBuf,

    /// Layers to offload to the GPU (0 = CPU only)
    #[serde(default)]
    pub gpu_layers: u32,

    /// Context size in tokens for each native context
    #[serde(default = "default_context_size")]
    pub context_size: u32,

    /// Token budget used for the remaining-token estimate of a session
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: u32,

    /// Generation parameters forwarded to every prompt
    #[serde(default)]
    pub generation: GenerationConfig,
}

/// Optional generation parameters.
///
/// Unset fields are never forwarded to the runtime so its own defaults apply.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct GenerationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Nucleus sampling threshold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,

    /// Minimum token probability relative to the most likely token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_p: Option<f32>,

    /// Maximum number of tokens to generate per turn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u32>,

    /// Text the model response is forced to start with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_prefix: Option<String>,
}

/// Session persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Directory for saved sessions (None = ~/.localchat/sessions)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<PathBuf>,

    /// Save the session after every completed turn
    #[serde(default = "default_true")]
    pub autosave: bool,
}

impl Default for LocalModelConfig {
    fn default() -> Self {
        Self {
            model_name: default_model_name(),
            model_path: PathBuf::new(),
            gpu_layers: 0,
            context_size: default_context_size(),
            max_context_tokens: default_max_context_tokens(),
            generation: GenerationConfig::default(),
        }
    }
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            storage_path: None,
            autosave: default_true(),
        }
    }
}

impl LocalModelConfig {
    /// Create a config for the given model file, naming the model after it
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        let model_path = model_path.into();
        let model_name = model_path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string)
            .unwrap_or_else(default_model_name);

        Self {
            model_name,
            model_path,
            ..Default::default()
        }
    }

    /// Set the context size
    pub fn with_context_size(mut self, size: u32) -> Self {
        self.context_size = size;
        self
    }

    /// Set the number of GPU layers
    pub fn with_gpu_layers(mut self, layers: u32) -> Self {
        self.gpu_layers = layers;
        self
    }

    /// Replace the generation parameters
    pub fn with_generation(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }
}

impl SessionsConfig {
    /// Effective directory for saved sessions
    pub fn storage_dir(&self) -> PathBuf {
        self.storage_path
            .clone()
            .unwrap_or_else(Settings::sessions_dir)
    }
}

fn default_model_name() -> String {
    "local".to_string()
}

fn default_context_size() -> u32 {
    4096
}

fn default_max_context_tokens() -> u32 {
    32768
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_model_config_default() {
        let config = LocalModelConfig::default();
        assert_eq!(config.model_name, "local");
        assert!(config.model_path.as_os_str().is_empty());
        assert_eq!(config.gpu_layers, 0);
        assert_eq!(config.context_size, 4096);
        assert_eq!(config.max_context_tokens, 32768);
        assert_eq!(config.generation, GenerationConfig::default());
    }

    #[test]
    fn test_local_model_config_new_uses_file_stem() {
        let config = LocalModelConfig::new("/models/llama-3.2-3b.Q4_K_M.gguf");
        assert_eq!(config.model_name, "llama-3.2-3b.Q4_K_M");
        assert_eq!(
            config.model_path,
            PathBuf::from("/models/llama-3.2-3b.Q4_K_M.gguf")
        );
    }

    #[test]
    fn test_builder_methods() {
        let config = LocalModelConfig::new("m.gguf")
            .with_context_size(8192)
            .with_gpu_layers(20)
            .with_generation(GenerationConfig {
                temperature: Some(0.2),
                ..Default::default()
            });
        assert_eq!(config.context_size, 8192);
        assert_eq!(config.gpu_layers, 20);
        assert_eq!(config.generation.temperature, Some(0.2));
    }

    #[test]
    fn test_generation_config_skips_unset_fields() {
        let generation = GenerationConfig {
            top_k: Some(40),
            ..Default::default()
        };
        let json = serde_json::to_string(&generation).unwrap();
        assert_eq!(json, r#"{"top_k":40}"#);
    }

    #[test]
    fn test_settings_partial_json() {
        let json = r#"{"local": {"model_path": "/m/a.gguf", "gpu_layers": 12}}"#;
        let settings: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.local.model_path, PathBuf::from("/m/a.gguf"));
        assert_eq!(settings.local.gpu_layers, 12);
        assert_eq!(settings.local.context_size, 4096);
        assert!(settings.sessions.autosave);
    }

    #[test]
    fn test_sessions_storage_dir_override() {
        let sessions = SessionsConfig {
            storage_path: Some(PathBuf::from("/tmp/sessions")),
            autosave: false,
        };
        assert_eq!(sessions.storage_dir(), PathBuf::from("/tmp/sessions"));
    }
}
