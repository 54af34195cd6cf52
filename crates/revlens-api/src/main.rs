//! revlens CLI entry point.
//!
//! Binary name: `revlens`
//!
//! Parses CLI arguments, sets up tracing, opens the session cache and
//! dispatches to the command handlers. Failures are reported with their
//! error kind; an interrupted stream exits with status 130.

mod cli;
mod state;

use std::process::ExitCode;

use clap::Parser;
use console::style;

use revlens_core::review::WorkflowError;
use revlens_observe::tracing_setup::{TracingOptions, init_tracing, shutdown_tracing};
use revlens_types::error::{AiError, ErrorKind};
use revlens_types::llm::Locale;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let options = TracingOptions {
        json: cli.log_json,
        otel: cli.otel,
        ..TracingOptions::from_verbosity(cli.verbose)
    };
    if let Err(e) = init_tracing(&options) {
        eprintln!("  {} failed to initialize logging: {e}", style("!").yellow().bold());
    }

    let locale = cli.lang;
    let code = match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report(&err, locale),
    };

    shutdown_tracing();
    code
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let state = AppState::init().await?;
    let json = cli.json;
    let locale = cli.lang;

    match cli.command {
        Commands::Session { action } => cli::session::run(&state, action, json).await?,
        Commands::Recent => cli::session::recent(&state, json).await?,
        Commands::Transcript { key, file } => {
            cli::review::transcript(&state, &key, file.as_deref(), json).await?;
        }
        Commands::ResetChat { key, force } => {
            cli::review::reset_chat(&state, &key, force, json).await?;
        }
        Commands::Checklist { key, file } => {
            cli::review::checklist(&state, &key, &file, locale, json).await?;
        }
        Commands::Check {
            key,
            file,
            item,
            uncheck,
        } => {
            cli::review::check(&state, &key, &file, &item, !uncheck, json).await?;
        }
        Commands::Chat { key, file, message } => {
            let message = message.join(" ");
            cli::review::chat(&state, &key, &file, &message, locale, json).await?;
        }
        Commands::Summary { key } => cli::review::summary(&state, &key, locale, json).await?,
        Commands::Sweep => cli::status::sweep(&state, json).await?,
        Commands::Key { action } => cli::key::run(&state, action, json).await?,
        Commands::Status => cli::status::status(&state, json).await?,
    }

    Ok(())
}

/// Taxonomy tag of a failure, when it came from the workflow or the model.
fn error_kind(err: &anyhow::Error) -> Option<ErrorKind> {
    if let Some(e) = err.downcast_ref::<WorkflowError>() {
        return Some(e.kind());
    }
    err.downcast_ref::<AiError>().map(AiError::kind)
}

fn kind_message(kind: ErrorKind, locale: Locale) -> &'static str {
    match (kind, locale) {
        (ErrorKind::InvalidInput, Locale::En) => "The request was not valid",
        (ErrorKind::InvalidInput, Locale::Ja) => "リクエストが正しくありません",
        (ErrorKind::ServiceUnavailable, Locale::En) => "The model service is unavailable",
        (ErrorKind::ServiceUnavailable, Locale::Ja) => "モデルサービスを利用できません",
        (ErrorKind::MalformedResponse, Locale::En) => "The model returned an unusable answer",
        (ErrorKind::MalformedResponse, Locale::Ja) => "モデルの応答を解釈できませんでした",
        (ErrorKind::Aborted, Locale::En) => "Stopped",
        (ErrorKind::Aborted, Locale::Ja) => "中断しました",
        (ErrorKind::NotFound, Locale::En) => "Not found",
        (ErrorKind::NotFound, Locale::Ja) => "見つかりません",
    }
}

fn report(err: &anyhow::Error, locale: Locale) -> ExitCode {
    match error_kind(err) {
        Some(ErrorKind::Aborted) => {
            println!();
            eprintln!("  {}", style(kind_message(ErrorKind::Aborted, locale)).dim());
            ExitCode::from(130)
        }
        Some(kind) => {
            eprintln!(
                "  {} {}: {err:#}",
                style("!").red().bold(),
                kind_message(kind, locale)
            );
            tracing::debug!(kind = %kind, error = ?err, "command failed");
            ExitCode::FAILURE
        }
        None => {
            eprintln!("  {} {err:#}", style("!").red().bold());
            ExitCode::FAILURE
        }
    }
}
