// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Translation between conversation messages and runtime chat history

use crate::llm::message::{Message, Role};
use crate::llm::runtime::{NativeHistoryItem, NativeSession};

/// Convert a conversation into the runtime's chat history format.
///
/// User messages become a single string (parts joined without separator).
/// Model messages keep their parts as separate response segments.
pub fn to_native_history(history: &[Message]) -> Vec<NativeHistoryItem> {
    history.iter().map(to_native_item).collect()
}

fn to_native_item(message: &Message) -> NativeHistoryItem {
    match message.role {
        Role::User => NativeHistoryItem::User {
            text: message.text(),
        },
        Role::Model => NativeHistoryItem::Model {
            response: message.parts.iter().map(|p| p.text.clone()).collect(),
        },
    }
}

/// Seed `session` with a prior conversation.
///
/// Translated items are appended after whatever the session already holds,
/// then the session's evaluation cache is invalidated so the next prompt
/// evaluates the full history. Returns the number of items appended.
pub fn hydrate_native_history(session: &mut dyn NativeSession, history: &[Message]) -> usize {
    let items = to_native_history(history);
    if items.is_empty() {
        return 0;
    }

    let appended = items.len();
    let mut native = session.chat_history().to_vec();
    native.extend(items);
    session.set_chat_history(native);
    session.invalidate_evaluation_cache();

    tracing::debug!(items = appended, "Hydrated native session history");
    appended
}
