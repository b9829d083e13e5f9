use evidex_core::config::AppConfig;
use evidex_core::error::CliError;
use evidex_core::playbook::PlaybookStore;
use evidex_core::replay::{format_text, PlaybookReplayer, ReplayOverrides};
use evidex_plugins::factory;

use crate::commands::cli::{fiscal_year_or_default, OutputFormat, ReplayArgs};

pub async fn handle_replay(args: ReplayArgs, cfg: &AppConfig) -> Result<i32, CliError> {
    let fiscal_year = fiscal_year_or_default(args.fy.as_deref());
    let overrides = ReplayOverrides::parse(&args.set).map_err(CliError::Command)?;
    if !overrides.is_empty() {
        tracing::info!(overrides = ?overrides, "replay overrides");
    }

    let show_progress = args.format == OutputFormat::Text
        && !args.no_progress
        && atty::is(atty::Stream::Stderr);
    let store = PlaybookStore::from_paths(&cfg.storage.resolved());
    let replayer =
        PlaybookReplayer::new(store, factory::build_tool_executor(cfg)).with_progress(show_progress);

    let outcome = replayer
        .replay(&fiscal_year, &args.rfi, &args.request, &overrides)
        .await;

    match args.format {
        OutputFormat::Json => {
            let body = serde_json::to_string_pretty(&outcome).map_err(anyhow::Error::from)?;
            println!("{body}");
        }
        OutputFormat::Text => {
            if let Some(summary) = outcome.result.as_ref() {
                print!("{}", format_text(summary));
            }
            if let Some(path) = outcome.report_path.as_deref() {
                println!("\nReport written to {path}");
            }
        }
    }

    if outcome.is_success() {
        Ok(0)
    } else {
        Err(CliError::Replay(
            outcome.error.unwrap_or_else(|| "replay failed".to_string()),
        ))
    }
}
