// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! localchat - chat with a local model in your terminal
//!
//! Entry point for the localchat REPL.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use crossterm::{
    style::{Color, ResetColor, SetForegroundColor},
    ExecutableCommand,
};

use localchat::cli::commands::HELP_TEXT;
use localchat::cli::{Cli, ReplCommand};
use localchat::config::Settings;
use localchat::history::SessionStore;
use localchat::llm::providers::LlamaCppRuntime;
use localchat::llm::{ChatSession, LocalLlmClient};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // `RUST_LOG` still takes precedence over `-v`
    let env_filter =
        tracing_subscriber::EnvFilter::from_default_env().add_directive(cli.log_level().into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .init();

    let mut settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    settings.local.apply_env()?;
    cli.apply_to(&mut settings);

    let store = SessionStore::open_at(settings.sessions.storage_dir())?;

    if cli.list_sessions {
        for record in store.list()? {
            println!(
                "{}  {}  {}",
                record.id,
                record.updated_at.format("%Y-%m-%d %H:%M"),
                record.title.as_deref().unwrap_or("(untitled)")
            );
        }
        return Ok(());
    }

    if settings.local.model_path.as_os_str().is_empty() {
        bail!("No model configured. Pass --model <PATH> or set LOCALCHAT_MODEL_PATH.");
    }

    let runtime = LlamaCppRuntime::new()?;
    let client = LocalLlmClient::new(settings.local.clone(), Arc::new(runtime));

    let mut session = match cli.resume {
        Some(id) => {
            let record = store
                .load(id)
                .with_context(|| format!("Cannot resume session {}", id))?;
            client.resume_chat_session(record)
        }
        None => client.create_chat_session(cli.system.clone(), None),
    };

    print_status(&client.preparing_message(), Color::DarkGrey)?;
    session.wait_ready().await?;
    print_status(&client.ready_message(), Color::DarkGrey)?;
    if !session.is_empty() {
        print_status(
            &format!("Resumed {} earlier messages", session.get_history().len()),
            Color::DarkGrey,
        )?;
    }

    run_repl(&mut session, &store, settings.sessions.autosave).await
}

async fn run_repl(
    session: &mut ChatSession,
    store: &SessionStore,
    autosave: bool,
) -> anyhow::Result<()> {
    loop {
        let Some(input) = read_user_input()? else {
            break;
        };

        match ReplCommand::parse(&input) {
            ReplCommand::Empty => continue,
            ReplCommand::Exit => break,
            ReplCommand::Help => println!("{}", HELP_TEXT),
            ReplCommand::Clear => {
                session.clear_history();
                print_status("History cleared", Color::DarkGrey)?;
            }
            ReplCommand::Undo => {
                if session.pop_last_exchange() {
                    print_status("Removed the last exchange", Color::DarkGrey)?;
                } else {
                    print_status("Nothing to undo", Color::Yellow)?;
                }
            }
            ReplCommand::Tokens => {
                let info = session.token_info();
                print_status(
                    &format!(
                        "~{} tokens used, ~{} of {} remaining",
                        info.total, info.remaining, info.max
                    ),
                    Color::DarkGrey,
                )?;
            }
            ReplCommand::Title(title) => match session.set_title(&title) {
                Ok(()) => print_status("Title updated", Color::DarkGrey)?,
                Err(e) => print_status(&e.to_string(), Color::Yellow)?,
            },
            ReplCommand::System(instruction) => {
                if instruction.is_empty() {
                    println!("{}", session.system_instruction());
                } else {
                    session.set_system_instruction(instruction);
                    print_status("System instruction updated", Color::DarkGrey)?;
                }
            }
            ReplCommand::Delete(raw) => match raw.parse::<Uuid>() {
                Ok(id) if id == session.session_id() => {
                    print_status("Cannot delete the active session", Color::Yellow)?;
                }
                Ok(id) => {
                    if store.delete(id)? {
                        print_status(&format!("Deleted session {}", id), Color::DarkGrey)?;
                    } else {
                        print_status(&format!("No saved session {}", id), Color::Yellow)?;
                    }
                }
                Err(_) => print_status("Usage: /delete <session id>", Color::Yellow)?,
            },
            ReplCommand::Save => {
                if store.save(&session.to_record())? {
                    print_status(
                        &format!("Saved session {}", session.session_id()),
                        Color::DarkGrey,
                    )?;
                } else {
                    print_status("Nothing to save yet", Color::Yellow)?;
                }
            }
            ReplCommand::Sessions => {
                for record in store.list()? {
                    println!(
                        "{}  {}",
                        record.id,
                        record.title.as_deref().unwrap_or("(untitled)")
                    );
                }
            }
            ReplCommand::Unknown(name) => {
                print_status(&format!("Unknown command /{} (try /help)", name), Color::Yellow)?;
            }
            ReplCommand::Message(text) => match session.send_message(&text).await {
                Ok(reply) => {
                    print_response_prefix()?;
                    println!("{}\n", reply);
                    if autosave {
                        if let Err(e) = store.save(&session.to_record()) {
                            tracing::warn!(error = %e, "Autosave failed");
                        }
                    }
                }
                Err(e) => print_status(&format!("Error: {}", e), Color::Red)?,
            },
        }
    }

    if autosave && store.save(&session.to_record())? {
        print_status(
            &format!("Session saved. Resume with --resume {}", session.session_id()),
            Color::DarkGrey,
        )?;
    }
    Ok(())
}

/// Read one line from stdin. Returns `None` at end of input.
fn read_user_input() -> anyhow::Result<Option<String>> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(Color::Green))?;
    print!("you: ");
    stdout.execute(ResetColor)?;
    stdout.flush()?;

    let mut input = String::new();
    if io::stdin().read_line(&mut input)? == 0 {
        return Ok(None);
    }
    Ok(Some(input))
}

fn print_response_prefix() -> anyhow::Result<()> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(Color::Cyan))?;
    print!("\nmodel: ");
    stdout.execute(ResetColor)?;
    Ok(())
}

fn print_status(message: &str, color: Color) -> anyhow::Result<()> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(color))?;
    println!("{}", message);
    stdout.execute(ResetColor)?;
    Ok(())
}
