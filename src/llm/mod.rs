// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! LLM module for localchat
//!
//! Chat sessions over a locally hosted inference runtime.

pub mod client;
pub mod history;
pub mod message;
pub mod mock_runtime;
pub mod model_cache;
pub mod providers;
pub mod runtime;
pub mod session;

pub use client::LocalLlmClient;
pub use message::*;
pub use session::{ChatSession, SessionState, TokenInfo};
