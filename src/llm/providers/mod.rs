// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Inference runtime implementations

#[cfg(feature = "local-llm")]
pub mod llama_cpp;

#[cfg(feature = "local-llm")]
pub use llama_cpp::LlamaCppRuntime;
