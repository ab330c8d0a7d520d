// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! localchat - chat sessions over a locally hosted LLM runtime.
//!
//! This crate exposes:
//! - `llm`: the client, chat sessions, the shared model cache and the
//!   runtime traits a local inference engine implements
//! - `config`: settings file and environment overlay
//! - `history`: saved sessions on disk
//! - `cli`: arguments for the `localchat` REPL (`src/main.rs`)
//!
//! The llama.cpp runtime is behind the `local-llm` feature; everything else
//! runs against any [`llm::runtime::InferenceRuntime`], including the
//! in-process [`llm::mock_runtime::MockRuntime`].

pub mod cli;
pub mod config;
pub mod error;
pub mod history;
pub mod llm;

pub use error::{LocalChatError, Result};
