//! Session cache CLI commands: import, open, list, show, remove, recent.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};

use revlens_types::session::{SessionIdentifier, SessionRecord, SessionSnapshot};

use super::{format_relative_time, parse_session_key};
use crate::state::AppState;

/// Session management subcommands.
#[derive(Subcommand)]
pub enum SessionCommand {
    /// Cache a session snapshot exported to a JSON file.
    Import {
        /// Path to the snapshot JSON.
        path: std::path::PathBuf,
    },

    /// Load a change request by URL, fetching it if it is not cached.
    Open {
        /// Pull or merge request URL.
        url: String,

        /// Fetch again even when cached (checklists are kept).
        #[arg(long)]
        refresh: bool,
    },

    /// List cached sessions.
    #[command(alias = "ls")]
    List,

    /// Show a cached session.
    Show {
        /// Session key or change-request URL.
        key: String,
    },

    /// Remove sessions with their transcripts and recency entries.
    #[command(alias = "rm")]
    Remove {
        /// Session keys or change-request URLs.
        #[arg(required = true, num_args = 1..)]
        keys: Vec<String>,

        /// Skip the confirmation prompt.
        #[arg(long, short)]
        force: bool,
    },
}

pub async fn run(state: &AppState, action: SessionCommand, json: bool) -> Result<()> {
    match action {
        SessionCommand::Import { path } => import_session(state, &path, json).await,
        SessionCommand::Open { url, refresh } => open_session(state, &url, refresh, json).await,
        SessionCommand::List => list_sessions(state, json).await,
        SessionCommand::Show { key } => show_session(state, &key, json).await,
        SessionCommand::Remove { keys, force } => remove_sessions(state, &keys, force, json).await,
    }
}

/// Import a snapshot file into the cache.
///
/// # Examples
///
/// ```bash
/// revlens session import ./widgets-42.json
/// ```
pub async fn import_session(state: &AppState, path: &Path, json: bool) -> Result<()> {
    let snapshot = read_snapshot_file(path).await?;
    let record = state.workflow.import_snapshot(snapshot).await?;
    print_saved(&record, "imported", json)
}

async fn read_snapshot_file(path: &Path) -> Result<SessionSnapshot> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("{} is not a session snapshot", path.display()))
}

pub async fn open_session(state: &AppState, url: &str, refresh: bool, json: bool) -> Result<()> {
    let identifier: SessionIdentifier = url.parse().map_err(|e: String| anyhow::anyhow!(e))?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.set_message(format!("Loading {}...", identifier.key()));
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));

    let result = state.workflow.load_session(&identifier, refresh).await;
    spinner.finish_and_clear();

    print_saved(&result?, "loaded", json)
}

fn print_saved(record: &SessionRecord, verb: &str, json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::json!({
                "action": verb,
                "key": record.key,
                "title": record.snapshot.title,
                "files": record.snapshot.files.len(),
            })
        );
    } else {
        println!(
            "  {} Session '{}' {verb} ({} files)",
            style("✓").green().bold(),
            style(&record.key).bold(),
            record.snapshot.files.len()
        );
        println!("  {}", style(&record.snapshot.title).dim());
    }
    Ok(())
}

/// List cached sessions, newest save first.
pub async fn list_sessions(state: &AppState, json: bool) -> Result<()> {
    let mut records = state.cache.get_all().await?;
    records.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));

    if json {
        let rows: Vec<_> = records
            .iter()
            .map(|r| {
                serde_json::json!({
                    "key": r.key,
                    "title": r.snapshot.title,
                    "state": r.snapshot.state,
                    "files": r.snapshot.files.len(),
                    "checklists": r.analysis.as_ref().map_or(0, |a| a.checklists.len()),
                    "saved_at": r.saved_at,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if records.is_empty() {
        println!();
        println!(
            "  {} No cached sessions. Import one with: {}",
            style("i").blue().bold(),
            style("revlens session import <snapshot.json>").yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Key").fg(Color::White),
            Cell::new("Title").fg(Color::White),
            Cell::new("State").fg(Color::White),
            Cell::new("Files").fg(Color::White),
            Cell::new("Checklists").fg(Color::White),
            Cell::new("Saved").fg(Color::White),
        ]);

    for record in &records {
        let checklists = record.analysis.as_ref().map_or(0, |a| a.checklists.len());
        table.add_row(vec![
            Cell::new(&record.key).fg(Color::Cyan),
            Cell::new(&record.snapshot.title),
            Cell::new(record.snapshot.state),
            Cell::new(record.snapshot.files.len()),
            Cell::new(checklists),
            Cell::new(format_relative_time(&record.saved_at)),
        ]);
    }

    println!();
    println!("{table}");
    println!(
        "  {} of {} sessions cached",
        records.len(),
        state.config.cache.cache_cap
    );
    println!();

    Ok(())
}

/// Show one cached session with its files and checklist progress.
pub async fn show_session(state: &AppState, key: &str, json: bool) -> Result<()> {
    let key = parse_session_key(key)?;
    let record = state
        .cache
        .get(&key)
        .await?
        .ok_or_else(|| anyhow::anyhow!("session '{key}' is not cached"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    let snapshot = &record.snapshot;
    println!();
    println!("  {}", style(&snapshot.title).bold());
    println!(
        "  {} by {} ({})",
        style(&snapshot.identifier).cyan(),
        snapshot.author,
        snapshot.state
    );
    println!("  {} {}", style("Saved:").dim(), format_relative_time(&record.saved_at));
    if !snapshot.review_comments.is_empty() {
        println!(
            "  {} {}",
            style("Review comments:").dim(),
            snapshot.review_comments.len()
        );
    }
    println!();

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("File").fg(Color::White),
            Cell::new("Status").fg(Color::White),
            Cell::new("+/-").fg(Color::White),
            Cell::new("Checklist").fg(Color::White),
        ]);

    for file in &snapshot.files {
        let progress = record
            .analysis
            .as_ref()
            .and_then(|a| a.checklist(&file.path))
            .map(|c| {
                let done = c.checklist_items.iter().filter(|i| i.is_checked).count();
                format!("{done}/{}", c.checklist_items.len())
            })
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            Cell::new(&file.path),
            Cell::new(format!("{:?}", file.status).to_lowercase()),
            Cell::new(format!("+{} -{}", file.additions, file.deletions)),
            Cell::new(progress),
        ]);
    }

    println!("{table}");
    println!();
    Ok(())
}

/// Remove sessions from every cache collection.
pub async fn remove_sessions(state: &AppState, keys: &[String], force: bool, json: bool) -> Result<()> {
    let keys = keys
        .iter()
        .map(|k| parse_session_key(k))
        .collect::<Result<Vec<_>>>()?;

    if !force && !json {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Remove {} session(s) and their chat history?",
                style(keys.len()).red().bold()
            ))
            .default(false)
            .interact()?;

        if !confirmed {
            println!("  Cancelled.");
            return Ok(());
        }
    }

    state.cache.remove_batch(&keys).await?;

    if json {
        println!("{}", serde_json::json!({"removed": keys}));
    } else {
        for key in &keys {
            println!("  {} Removed '{}'", style("✓").red().bold(), key);
        }
    }
    Ok(())
}

/// Recently viewed sessions, most recent first.
pub async fn recent(state: &AppState, json: bool) -> Result<()> {
    let entries = state.cache.recent().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!();
        println!("  {} Nothing viewed yet.", style("i").blue().bold());
        println!();
        return Ok(());
    }

    println!();
    for (i, entry) in entries.iter().enumerate() {
        println!(
            "  {:>2}. {}  {}  {}",
            i + 1,
            style(&entry.key).cyan(),
            entry.title,
            style(format_relative_time(&entry.touched_at)).dim()
        );
    }
    println!();
    Ok(())
}
