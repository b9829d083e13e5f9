use std::path::Path;

use evidex_core::analyzer::RfiAnalysis;
use evidex_core::config::AppConfig;
use evidex_core::error::CliError;
use evidex_core::playbook::{Playbook, PlaybookBuilder, PlaybookStore};

use crate::commands::analyze::run_analysis;
use crate::commands::cli::{fiscal_year_or_default, BuildArgs};

pub async fn handle_build(args: BuildArgs, cfg: &AppConfig) -> Result<i32, CliError> {
    let fiscal_year = fiscal_year_or_default(args.fy.as_deref());

    let analysis = match (args.analysis.as_ref(), args.source.as_ref()) {
        (Some(path), _) => load_analysis(path)?,
        (None, Some(root)) => run_analysis(root, &args.rfi, args.product.as_deref(), cfg).await?,
        (None, None) => {
            return Err(CliError::Command(
                "either --analysis or --source is required".to_string(),
            ))
        }
    };

    let playbook = build(&fiscal_year, &args.rfi, &analysis, args.source_urls, args.notes, cfg);
    let store = PlaybookStore::from_paths(&cfg.storage.resolved());
    let path = store.save_playbook(&playbook)?;

    println!(
        "Playbook {} / {}: {} tasks -> {}",
        playbook.fiscal_year,
        playbook.rfi,
        playbook.tasks.len(),
        path.display()
    );
    if !analysis.plan.needs_manual_review.is_empty() {
        println!(
            "Not replicable, collect by hand: {}",
            analysis.plan.needs_manual_review.join(", ")
        );
    }
    Ok(0)
}

pub fn build(
    fiscal_year: &str,
    rfi: &str,
    analysis: &RfiAnalysis,
    mut source_urls: Vec<String>,
    notes: Option<String>,
    cfg: &AppConfig,
) -> Playbook {
    if let Some(url) = analysis.folder.as_ref().and_then(|f| f.url.clone()) {
        if !source_urls.contains(&url) {
            source_urls.push(url);
        }
    }
    PlaybookBuilder::new(cfg.analyzer.default_region.clone()).build(
        fiscal_year,
        rfi,
        &analysis.entries,
        source_urls,
        notes,
    )
}

fn load_analysis(path: &Path) -> Result<RfiAnalysis, CliError> {
    let raw = std::fs::read_to_string(path)?;
    serde_json::from_str(&raw)
        .map_err(|e| CliError::Command(format!("invalid analysis file {}: {}", path.display(), e)))
}
