//! API key commands: set, clear, status.
//!
//! The key is written to the OS keychain. `REVLENS_<NAME>` or `<NAME>` in
//! the environment takes precedence when present.

use anyhow::Result;
use clap::Subcommand;
use console::style;
use dialoguer::Password;

use crate::state::AppState;

#[derive(Subcommand)]
pub enum KeyCommand {
    /// Store the API key in the OS keychain.
    Set {
        /// Key value (prompted for when omitted).
        #[arg(long)]
        value: Option<String>,
    },

    /// Remove the stored API key.
    Clear,

    /// Show whether an API key is available.
    Status,
}

pub async fn run(state: &AppState, action: KeyCommand, json: bool) -> Result<()> {
    let name = state.config.model.api_key_secret_name.as_str();
    match action {
        KeyCommand::Set { value } => set_key(state, name, value.as_deref(), json).await,
        KeyCommand::Clear => clear_key(state, name, json).await,
        KeyCommand::Status => key_status(state, name, json).await,
    }
}

/// Store the key, prompting with hidden input when no value was given.
///
/// # Examples
///
/// ```bash
/// # Secure prompt (recommended)
/// revlens key set
///
/// # Script/automation mode
/// revlens key set --value sk-ant-...
/// ```
async fn set_key(state: &AppState, name: &str, value: Option<&str>, json: bool) -> Result<()> {
    let secret = match value {
        Some(v) => v.to_string(),
        None => Password::new()
            .with_prompt(format!("Enter value for {}", style(name).bold()))
            .interact()?,
    };
    if secret.trim().is_empty() {
        anyhow::bail!("API key must not be empty");
    }

    state.credentials.set(name, secret.trim()).await?;

    if json {
        println!(
            "{}",
            serde_json::json!({"set": true, "name": name, "masked": mask_secret(secret.trim())})
        );
    } else {
        println!(
            "  {} '{}' stored ({})",
            style("✓").green().bold(),
            style(name).bold(),
            mask_secret(secret.trim())
        );
    }
    Ok(())
}

async fn clear_key(state: &AppState, name: &str, json: bool) -> Result<()> {
    state.credentials.clear(name).await?;

    if json {
        println!("{}", serde_json::json!({"cleared": true, "name": name}));
    } else {
        println!("  {} '{}' cleared.", style("✓").green().bold(), style(name).bold());
    }
    Ok(())
}

async fn key_status(state: &AppState, name: &str, json: bool) -> Result<()> {
    let resolved = state.credentials.resolve(name).await;
    let stores = state.credentials.store_names();

    if json {
        println!(
            "{}",
            serde_json::json!({
                "name": name,
                "available": resolved.is_some(),
                "masked": resolved.as_deref().map(mask_secret),
                "stores": stores,
            })
        );
        return Ok(());
    }

    match resolved {
        Some(value) => println!(
            "  {} {} available ({})",
            style("✓").green().bold(),
            style(name).bold(),
            mask_secret(&value)
        ),
        None => {
            println!("  {} {} not found", style("✗").red().bold(), style(name).bold());
            println!(
                "  {}",
                style(format!("Looked in: {}. Set one with: revlens key set", stores.join(", "))).dim()
            );
        }
    }
    Ok(())
}

/// Keep the first and last four characters of long secrets.
fn mask_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 12 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("sk-ant-api03-abcdefgh"), "sk-a...efgh");
        assert_eq!(mask_secret("short"), "****");
        assert_eq!(mask_secret(""), "****");
    }
}
