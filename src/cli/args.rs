// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! CLI argument definitions using Clap

use clap::Parser;
use std::path::PathBuf;
use uuid::Uuid;

use crate::config::Settings;

/// localchat - chat with a local GGUF model in your terminal
#[derive(Parser, Debug)]
#[command(name = "localchat")]
#[command(version, about = "Chat with a local model in your terminal")]
pub struct Cli {
    /// Path to a GGUF model file
    #[arg(short, long, value_name = "PATH")]
    pub model: Option<PathBuf>,

    /// Number of layers to offload to the GPU
    #[arg(long)]
    pub gpu_layers: Option<u32>,

    /// Context window size in tokens
    #[arg(long)]
    pub context_size: Option<u32>,

    /// System instruction for the session
    #[arg(short, long, default_value = "You are a helpful assistant.")]
    pub system: String,

    /// Resume a saved session by ID
    #[arg(long, value_name = "ID")]
    pub resume: Option<Uuid>,

    /// List saved sessions and exit
    #[arg(long)]
    pub list_sessions: bool,

    /// Config file path
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Apply command-line overrides on top of loaded settings
    pub fn apply_to(&self, settings: &mut Settings) {
        if let Some(model) = &self.model {
            settings.local.model_path = model.clone();
            if let Some(stem) = model.file_stem().and_then(|s| s.to_str()) {
                settings.local.model_name = stem.to_string();
            }
        }
        if let Some(layers) = self.gpu_layers {
            settings.local.gpu_layers = layers;
        }
        if let Some(size) = self.context_size {
            settings.local.context_size = size;
        }
    }

    /// Tracing level implied by `-v` flags
    pub fn log_level(&self) -> tracing::Level {
        match self.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["localchat"]);
        assert!(cli.model.is_none());
        assert!(cli.resume.is_none());
        assert!(!cli.list_sessions);
        assert_eq!(cli.verbose, 0);
        assert_eq!(cli.system, "You are a helpful assistant.");
        assert_eq!(cli.log_level(), tracing::Level::WARN);
    }

    #[test]
    fn test_cli_verbose_multiple() {
        let cli = Cli::parse_from(["localchat", "-vv"]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.log_level(), tracing::Level::DEBUG);
    }

    #[test]
    fn test_cli_model_options() {
        let cli = Cli::parse_from([
            "localchat",
            "-m",
            "/models/qwen2.5-7b.gguf",
            "--gpu-layers",
            "33",
            "--context-size",
            "8192",
            "-s",
            "Be terse.",
        ]);
        assert_eq!(cli.model, Some(PathBuf::from("/models/qwen2.5-7b.gguf")));
        assert_eq!(cli.gpu_layers, Some(33));
        assert_eq!(cli.context_size, Some(8192));
        assert_eq!(cli.system, "Be terse.");
    }

    #[test]
    fn test_cli_resume_requires_uuid() {
        let id = Uuid::new_v4();
        let cli = Cli::parse_from(["localchat", "--resume", &id.to_string()]);
        assert_eq!(cli.resume, Some(id));

        assert!(Cli::try_parse_from(["localchat", "--resume", "not-a-uuid"]).is_err());
    }

    #[test]
    fn test_apply_to_overrides_settings() {
        let mut settings = Settings::default();
        let cli = Cli::parse_from([
            "localchat",
            "--model",
            "/models/llama-3.gguf",
            "--gpu-layers",
            "12",
        ]);
        cli.apply_to(&mut settings);

        assert_eq!(settings.local.model_path, PathBuf::from("/models/llama-3.gguf"));
        assert_eq!(settings.local.model_name, "llama-3");
        assert_eq!(settings.local.gpu_layers, 12);
        assert_eq!(settings.local.context_size, 4096);
    }

    #[test]
    fn test_apply_to_without_flags_keeps_settings() {
        let mut settings = Settings::default();
        settings.local.gpu_layers = 7;
        Cli::parse_from(["localchat"]).apply_to(&mut settings);
        assert_eq!(settings.local.gpu_layers, 7);
    }
}
