//! CLI command definitions and dispatch helpers for the `revlens` binary.
//!
//! Uses clap derive macros for argument parsing. Session-scoped commands
//! take a session key (`github.com/acme/widgets/42`) or the change-request
//! URL it was derived from.

pub mod key;
pub mod review;
pub mod session;
pub mod status;

use clap::{Parser, Subcommand};

use revlens_types::llm::Locale;
use revlens_types::session::{SessionIdentifier, SessionKey};

/// Review pull and merge requests with a model at your side.
#[derive(Parser)]
#[command(name = "revlens", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Detailed logging (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    /// Language for generated checklists, answers and summaries (en, ja).
    #[arg(long, global = true, env = "REVLENS_LOCALE", default_value = "en")]
    pub lang: Locale,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage cached review sessions (import, open, list, show, remove).
    Session {
        #[command(subcommand)]
        action: session::SessionCommand,
    },

    /// Recently viewed sessions, most recent first.
    Recent,

    /// Show the chat transcript of a session, or of one file in it.
    Transcript {
        /// Session key or change-request URL.
        key: String,

        /// Only show the discussion about this file.
        file: Option<String>,
    },

    /// Delete every file discussion of a session.
    #[command(name = "reset-chat")]
    ResetChat {
        /// Session key or change-request URL.
        key: String,

        /// Skip the confirmation prompt.
        #[arg(long, short)]
        force: bool,
    },

    /// Generate a review checklist for one file.
    Checklist {
        /// Session key or change-request URL.
        key: String,

        /// Path of the changed file.
        file: String,
    },

    /// Tick (or untick) a checklist item.
    Check {
        /// Session key or change-request URL.
        key: String,

        /// Path of the changed file.
        file: String,

        /// Checklist item id.
        item: String,

        /// Mark the item as not done.
        #[arg(long)]
        uncheck: bool,
    },

    /// Ask a question about one file. Ctrl+C stops the answer.
    Chat {
        /// Session key or change-request URL.
        key: String,

        /// Path of the changed file.
        file: String,

        /// The question.
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },

    /// Summarize the whole change request. Ctrl+C stops the summary.
    Summary {
        /// Session key or change-request URL.
        key: String,
    },

    /// Remove transcripts and recency entries left without a session.
    Sweep,

    /// Manage the model API key.
    Key {
        #[command(subcommand)]
        action: key::KeyCommand,
    },

    /// Cache and configuration overview.
    Status,
}

/// Accept either a change-request URL or a raw session key.
pub fn parse_session_key(input: &str) -> anyhow::Result<SessionKey> {
    let trimmed = input.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        anyhow::bail!("session key must not be empty");
    }
    if trimmed.contains("://") || trimmed.contains("/pull/") || trimmed.contains("/-/merge_requests/") {
        let identifier: SessionIdentifier = trimmed.parse().map_err(|e: String| anyhow::anyhow!(e))?;
        return Ok(identifier.key());
    }
    Ok(SessionKey::from(trimmed))
}

/// Format a timestamp as a short relative string ("3m ago", "2d ago").
pub fn format_relative_time(dt: &chrono::DateTime<chrono::Utc>) -> String {
    let diff = chrono::Utc::now() - *dt;

    if diff.num_seconds() < 60 {
        "just now".to_string()
    } else if diff.num_minutes() < 60 {
        format!("{}m ago", diff.num_minutes())
    } else if diff.num_hours() < 24 {
        format!("{}h ago", diff.num_hours())
    } else if diff.num_days() < 30 {
        format!("{}d ago", diff.num_days())
    } else {
        dt.format("%Y-%m-%d").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn test_parse_chat_command() {
        let cli = Cli::try_parse_from([
            "revlens",
            "chat",
            "github.com/acme/widgets/7",
            "src/retry.rs",
            "why",
            "retry?",
        ])
        .unwrap();
        match cli.command {
            Commands::Chat { key, file, message } => {
                assert_eq!(key, "github.com/acme/widgets/7");
                assert_eq!(file, "src/retry.rs");
                assert_eq!(message.join(" "), "why retry?");
            }
            _ => panic!("expected chat"),
        }
        assert_eq!(cli.lang, Locale::En);
    }

    #[test]
    fn test_chat_requires_message() {
        assert!(Cli::try_parse_from(["revlens", "chat", "k", "f"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["revlens", "recent", "--json", "-vv", "--lang", "ja"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.lang, Locale::Ja);
        assert!(matches!(cli.command, Commands::Recent));
    }

    #[test]
    fn test_session_remove_many() {
        let cli = Cli::try_parse_from(["revlens", "session", "remove", "a/b/c/1", "a/b/c/2", "--force"])
            .unwrap();
        match cli.command {
            Commands::Session {
                action: session::SessionCommand::Remove { keys, force },
            } => {
                assert_eq!(keys.len(), 2);
                assert!(force);
            }
            _ => panic!("expected session remove"),
        }
    }

    #[test]
    fn test_reset_chat_name() {
        let cli = Cli::try_parse_from(["revlens", "reset-chat", "a/b/c/1"]).unwrap();
        assert!(matches!(cli.command, Commands::ResetChat { force: false, .. }));
    }

    #[test]
    fn test_parse_session_key_from_url() {
        let key = parse_session_key("https://github.com/acme/widgets/pull/42/files").unwrap();
        assert_eq!(key.as_str(), "github.com/acme/widgets/42");

        let key = parse_session_key("https://gitlab.example.com/g/sub/widgets/-/merge_requests/3").unwrap();
        assert_eq!(key.as_str(), "gitlab.example.com/g/sub/widgets/3");
    }

    #[test]
    fn test_parse_session_key_raw() {
        let key = parse_session_key(" github.com/acme/widgets/42/ ").unwrap();
        assert_eq!(key.as_str(), "github.com/acme/widgets/42");
        assert!(parse_session_key("   ").is_err());
        assert!(parse_session_key("https://example.com/not/a/change").is_err());
    }

    #[test]
    fn test_format_relative_time() {
        let now = Utc::now();
        assert_eq!(format_relative_time(&now), "just now");
        assert_eq!(format_relative_time(&(now - Duration::minutes(5))), "5m ago");
        assert_eq!(format_relative_time(&(now - Duration::hours(3))), "3h ago");
        assert_eq!(format_relative_time(&(now - Duration::days(2))), "2d ago");

        let old = now - Duration::days(90);
        assert_eq!(format_relative_time(&old), old.format("%Y-%m-%d").to_string());
    }
}
