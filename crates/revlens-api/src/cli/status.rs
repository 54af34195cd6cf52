//! Status dashboard and cache maintenance.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use crate::state::AppState;

/// Show cache usage, storage and model configuration.
pub async fn status(state: &AppState, json: bool) -> Result<()> {
    let sessions = state.cache.get_all().await?;
    let recent = state.cache.recent().await?;
    let entries = state.store.entries().await?;
    let key_available = state
        .credentials
        .resolve(&state.config.model.api_key_secret_name)
        .await
        .is_some();
    let cache = state.config.cache;
    let model = &state.config.model;

    if json {
        let status = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "data_dir": state.data_dir.display().to_string(),
            "sessions": { "cached": sessions.len(), "cap": cache.cache_cap },
            "recent": { "entries": recent.len(), "cap": cache.recency_cap },
            "storage": entries,
            "model": {
                "provider": model.provider,
                "model": model.model,
                "api_key": key_available,
            },
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} {}",
        style("revlens").cyan().bold(),
        style(format!("v{}", env!("CARGO_PKG_VERSION"))).dim()
    );
    println!("  {} {}", style("Data:").dim(), state.data_dir.display());
    println!();

    println!("  {}", style("── Cache ──").dim());
    println!("  Sessions: {}/{}", style(sessions.len()).bold(), cache.cache_cap);
    println!("  Recent:   {}/{}", style(recent.len()).bold(), cache.recency_cap);
    println!();

    if !entries.is_empty() {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("Collection").fg(Color::White),
                Cell::new("Size").fg(Color::White),
                Cell::new("Updated").fg(Color::White),
            ]);
        for entry in &entries {
            table.add_row(vec![
                Cell::new(&entry.name),
                Cell::new(format_bytes(entry.bytes)),
                Cell::new(super::format_relative_time(&entry.updated_at)),
            ]);
        }
        println!("{table}");
        println!();
    }

    println!("  {}", style("── Model ──").dim());
    println!("  {} / {}", model.provider, style(&model.model).bold());
    let key_line = if key_available {
        format!("{} {}", style("✓").green(), model.api_key_secret_name)
    } else {
        format!("{} {} (run: revlens key set)", style("✗").red(), model.api_key_secret_name)
    };
    println!("  {key_line}");
    println!();

    Ok(())
}

/// Remove transcripts and recency entries whose session is gone.
pub async fn sweep(state: &AppState, json: bool) -> Result<()> {
    let report = state.cache.sweep_orphans().await?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "transcripts": report.transcripts,
                "recency_entries": report.recency_entries,
            })
        );
    } else if report.transcripts + report.recency_entries == 0 {
        println!("  {} Nothing to sweep.", style("✓").green().bold());
    } else {
        println!(
            "  {} Removed {} orphaned transcript(s) and {} recency entr{}.",
            style("✓").green().bold(),
            report.transcripts,
            report.recency_entries,
            if report.recency_entries == 1 { "y" } else { "ies" }
        );
    }
    Ok(())
}

fn format_bytes(bytes: usize) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.1} MiB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.1} KiB", bytes as f64 / 1024.0)
    } else {
        format!("{bytes} B")
    }
}
