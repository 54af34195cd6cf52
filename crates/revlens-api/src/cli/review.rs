//! Review commands: checklist, check, chat, summary, transcript, reset-chat.
//!
//! Chat and summary stream tokens to stdout as they arrive. Ctrl+C cancels
//! the stream; a partial chat answer is kept in the transcript.

use std::io::Write;

use anyhow::Result;
use console::style;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;

use revlens_types::chat::{ChatSender, ChatTurn};
use revlens_types::llm::Locale;
use revlens_types::session::SessionKey;

use super::parse_session_key;
use crate::state::AppState;

fn spinner(message: &str, json: bool) -> Result<ProgressBar> {
    if json {
        return Ok(ProgressBar::hidden());
    }
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    Ok(spinner)
}

/// Cancel the returned token on the first Ctrl+C.
///
/// Abort the handle once the stream is over so the signal handler does not
/// outlive the command.
fn cancel_on_ctrl_c() -> (CancellationToken, tokio::task::JoinHandle<()>) {
    let token = CancellationToken::new();
    let trigger = token.clone();
    let handle = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("interrupt received, cancelling stream");
            trigger.cancel();
        }
    });
    (token, handle)
}

async fn require_cached(state: &AppState, key: &SessionKey) -> Result<()> {
    if state.cache.get(key).await?.is_none() {
        anyhow::bail!("session '{key}' is not cached; import or open it first");
    }
    Ok(())
}

/// Generate (or regenerate) the checklist for one file.
pub async fn checklist(state: &AppState, key: &str, file: &str, locale: Locale, json: bool) -> Result<()> {
    let key = parse_session_key(key)?;

    let spinner = spinner(&format!("Reviewing {file}..."), json)?;
    let result = state.workflow.generate_checklist(&key, file, locale).await;
    spinner.finish_and_clear();
    let checklist = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&checklist)?);
        return Ok(());
    }

    println!();
    println!("  {}", style(&checklist.filename).cyan().bold());
    println!();
    for line in checklist.explanation.lines() {
        println!("  {line}");
    }
    println!();
    for item in &checklist.checklist_items {
        let mark = if item.is_checked {
            style("[x]").green()
        } else {
            style("[ ]").dim()
        };
        println!("  {mark} {} {}", style(&item.id).dim(), item.description);
    }
    println!();
    println!(
        "  {}",
        style(format!("Tick items with: revlens check {key} {file} <id>")).dim()
    );
    println!();
    Ok(())
}

/// Tick or untick a checklist item.
pub async fn check(state: &AppState, key: &str, file: &str, item: &str, checked: bool, json: bool) -> Result<()> {
    let key = parse_session_key(key)?;
    if !state.workflow.set_item_checked(&key, file, item, checked).await? {
        anyhow::bail!("no checklist item '{item}' for {file} in {key}");
    }

    if json {
        println!(
            "{}",
            serde_json::json!({"key": key, "file": file, "item": item, "checked": checked})
        );
    } else {
        let mark = if checked { style("✓").green().bold() } else { style("○").dim() };
        println!("  {mark} {item} ({file})");
    }
    Ok(())
}

/// Ask a question about one file and stream the answer.
pub async fn chat(
    state: &AppState,
    key: &str,
    file: &str,
    message: &str,
    locale: Locale,
    json: bool,
) -> Result<()> {
    let key = parse_session_key(key)?;

    let spinner = spinner("thinking...", json)?;
    let (cancel, signal) = cancel_on_ctrl_c();
    let mut started = false;
    let on_token = |token: &str| {
        if json {
            return;
        }
        if !started {
            spinner.finish_and_clear();
            print!("\n  {} ", style("revlens").cyan().bold());
            started = true;
        }
        print!("{token}");
        let _ = std::io::stdout().flush();
    };

    let result = state
        .workflow
        .chat(&key, file, message, locale, on_token, Some(&cancel))
        .await;
    signal.abort();
    spinner.finish_and_clear();

    let reply = result?;
    if json {
        println!(
            "{}",
            serde_json::json!({"key": key, "file": file, "reply": reply})
        );
    } else {
        println!();
        println!();
    }
    Ok(())
}

/// Stream a summary of the whole change request.
pub async fn summary(state: &AppState, key: &str, locale: Locale, json: bool) -> Result<()> {
    let key = parse_session_key(key)?;

    let spinner = spinner("summarizing...", json)?;
    let (cancel, signal) = cancel_on_ctrl_c();
    let mut started = false;
    let on_token = |token: &str| {
        if json {
            return;
        }
        if !started {
            spinner.finish_and_clear();
            println!();
            print!("  ");
            started = true;
        }
        print!("{}", token.replace('\n', "\n  "));
        let _ = std::io::stdout().flush();
    };

    let result = state
        .workflow
        .summarize(&key, locale, on_token, Some(&cancel))
        .await;
    signal.abort();
    spinner.finish_and_clear();

    let text = result?;
    if json {
        println!("{}", serde_json::json!({"key": key, "summary": text}));
    } else {
        println!();
        println!();
    }
    Ok(())
}

fn print_turns(turns: &[ChatTurn]) {
    for turn in turns {
        let who = match turn.sender {
            ChatSender::User => style("you").yellow().bold(),
            ChatSender::Assistant => style("revlens").cyan().bold(),
        };
        println!("  {who}");
        for line in turn.text.lines() {
            println!("    {line}");
        }
        if turn.interrupted {
            println!("    {}", style("(interrupted)").dim().italic());
        }
        println!();
    }
}

/// Print the chat transcript of a session, or of one file.
pub async fn transcript(state: &AppState, key: &str, file: Option<&str>, json: bool) -> Result<()> {
    let key = parse_session_key(key)?;
    require_cached(state, &key).await?;

    if let Some(file) = file {
        let turns = state.cache.transcript(&key, file).await?;
        if json {
            println!("{}", serde_json::to_string_pretty(&turns)?);
            return Ok(());
        }
        println!();
        if turns.is_empty() {
            println!("  {} No discussion about {file} yet.", style("i").blue().bold());
            println!();
        } else {
            print_turns(&turns);
        }
        return Ok(());
    }

    let transcripts = state.cache.transcripts(&key).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&transcripts)?);
        return Ok(());
    }

    println!();
    if transcripts.values().all(|turns| turns.is_empty()) {
        println!(
            "  {} No discussion yet. Start one with: {}",
            style("i").blue().bold(),
            style(format!("revlens chat {key} <file> <question>")).yellow()
        );
        println!();
        return Ok(());
    }
    for (path, turns) in transcripts.iter().filter(|(_, turns)| !turns.is_empty()) {
        println!("  {}", style(format!("── {path} ──")).dim());
        println!();
        print_turns(turns);
    }
    Ok(())
}

/// Delete every file discussion of a session.
pub async fn reset_chat(state: &AppState, key: &str, force: bool, json: bool) -> Result<()> {
    let key = parse_session_key(key)?;
    require_cached(state, &key).await?;

    if !force && !json {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Delete all chat history of '{}'?",
                style(&key).red().bold()
            ))
            .default(false)
            .interact()?;

        if !confirmed {
            println!("  Cancelled.");
            return Ok(());
        }
    }

    state.workflow.reset_discussion(&key).await?;

    if json {
        println!("{}", serde_json::json!({"reset": true, "key": key}));
    } else {
        println!("  {} Chat history of '{}' cleared.", style("✓").green().bold(), key);
    }
    Ok(())
}
