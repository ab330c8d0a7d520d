// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Saved chat sessions
//!
//! Persists session history so a conversation can be resumed later with
//! the stored turns hydrated into a fresh native session.

pub mod store;

pub use store::{SessionRecord, SessionStore};
