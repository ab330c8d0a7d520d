// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{LocalChatError, Result};

use super::LocalModelConfig;

impl LocalModelConfig {
    /// Overlay `LOCALCHAT_*` environment variables onto this config.
    ///
    /// Priority: env var > config file.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    /// Overlay values from an arbitrary lookup, used by `apply_env`.
    pub fn apply_vars<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup("LOCALCHAT_MODEL_NAME") {
            self.model_name = name;
        }
        if let Some(path) = lookup("LOCALCHAT_MODEL_PATH") {
            self.model_path = PathBuf::from(path);
        }
        if let Some(layers) = parse_var(&lookup, "LOCALCHAT_GPU_LAYERS")? {
            self.gpu_layers = layers;
        }
        if let Some(size) = parse_var(&lookup, "LOCALCHAT_CONTEXT_SIZE")? {
            self.context_size = size;
        }

        let generation = &mut self.generation;
        if let Some(v) = parse_var(&lookup, "LOCALCHAT_TEMPERATURE")? {
            generation.temperature = Some(v);
        }
        if let Some(v) = parse_var(&lookup, "LOCALCHAT_TOP_P")? {
            generation.top_p = Some(v);
        }
        if let Some(v) = parse_var(&lookup, "LOCALCHAT_TOP_K")? {
            generation.top_k = Some(v);
        }
        if let Some(v) = parse_var(&lookup, "LOCALCHAT_MIN_P")? {
            generation.min_p = Some(v);
        }
        if let Some(v) = parse_var(&lookup, "LOCALCHAT_MAX_TOKENS")? {
            generation.max_tokens = Some(v);
        }
        if let Some(v) = parse_var(&lookup, "LOCALCHAT_SEED")? {
            generation.seed = Some(v);
        }
        if let Some(prefix) = lookup("LOCALCHAT_RESPONSE_PREFIX") {
            generation.response_prefix = Some(prefix);
        }

        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, name: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| LocalChatError::Config(format!("{}={:?}: {}", name, raw, e))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_apply_vars_overrides_fields() {
        let mut config = LocalModelConfig::default();
        config
            .apply_vars(lookup_from(&[
                ("LOCALCHAT_MODEL_PATH", "/models/gemma.gguf"),
                ("LOCALCHAT_GPU_LAYERS", "28"),
                ("LOCALCHAT_CONTEXT_SIZE", "8192"),
                ("LOCALCHAT_TEMPERATURE", "0.7"),
                ("LOCALCHAT_SEED", "42"),
                ("LOCALCHAT_RESPONSE_PREFIX", "Sure,"),
            ]))
            .unwrap();

        assert_eq!(config.model_path, PathBuf::from("/models/gemma.gguf"));
        assert_eq!(config.gpu_layers, 28);
        assert_eq!(config.context_size, 8192);
        assert_eq!(config.generation.temperature, Some(0.7));
        assert_eq!(config.generation.seed, Some(42));
        assert_eq!(config.generation.response_prefix.as_deref(), Some("Sure,"));
        assert_eq!(config.generation.top_p, None);
    }

    #[test]
    fn test_apply_vars_empty_value_is_ignored() {
        let mut config = LocalModelConfig::default();
        config
            .apply_vars(lookup_from(&[("LOCALCHAT_TOP_K", "  ")]))
            .unwrap();
        assert_eq!(config.generation.top_k, None);
    }

    #[test]
    fn test_apply_vars_invalid_number_names_variable() {
        let mut config = LocalModelConfig::default();
        let err = config
            .apply_vars(lookup_from(&[("LOCALCHAT_GPU_LAYERS", "lots")]))
            .unwrap_err();
        assert!(matches!(err, LocalChatError::Config(_)));
        assert!(err.to_string().contains("LOCALCHAT_GPU_LAYERS"));
    }
}
