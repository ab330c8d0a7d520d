// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! REPL input classification
//!
//! Pure parsing of a line typed at the prompt; the REPL in `main.rs` acts on
//! the result.

/// A line of REPL input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    /// Blank line
    Empty,
    /// Leave the REPL
    Exit,
    /// Show available commands
    Help,
    /// Drop the whole history
    Clear,
    /// Remove the last user/model exchange
    Undo,
    /// Show the token estimate
    Tokens,
    /// Save the session now
    Save,
    /// List saved sessions
    Sessions,
    /// Set the session title
    Title(String),
    /// Replace the system instruction (empty shows the current one)
    System(String),
    /// Delete a saved session by ID
    Delete(String),
    /// Slash command that is not recognized
    Unknown(String),
    /// Text to send to the model
    Message(String),
}

impl ReplCommand {
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Self::Empty;
        }

        let lower = trimmed.to_lowercase();
        if matches!(lower.as_str(), "exit" | "quit") {
            return Self::Exit;
        }

        let Some(rest) = trimmed.strip_prefix('/') else {
            return Self::Message(trimmed.to_string());
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };

        match name.to_lowercase().as_str() {
            "exit" | "quit" => Self::Exit,
            "help" => Self::Help,
            "clear" => Self::Clear,
            "undo" | "pop" => Self::Undo,
            "tokens" => Self::Tokens,
            "save" => Self::Save,
            "sessions" => Self::Sessions,
            "title" => Self::Title(arg.to_string()),
            "system" => Self::System(arg.to_string()),
            "delete" => Self::Delete(arg.to_string()),
            _ => Self::Unknown(name.to_string()),
        }
    }
}

/// Help text printed for `/help`
pub const HELP_TEXT: &str = "\
/help            show this help
/clear           start over with an empty history
/undo            remove the last exchange
/tokens          show the token estimate
/title <text>    set the session title
/system [text]   show or replace the system instruction
/save            save the session now
/sessions        list saved sessions
/delete <id>     delete a saved session
/exit            quit";
