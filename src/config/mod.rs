// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Configuration module for localchat
//!
//! Handles loading, saving, and environment overrides of the model settings.

pub mod settings;

pub use settings::*;
