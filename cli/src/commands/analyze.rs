use std::path::Path;

use evidex_core::analyzer::RfiAnalysis;
use evidex_core::config::AppConfig;
use evidex_core::error::CliError;
use evidex_plugins::factory;

use crate::commands::cli::{AnalyzeArgs, OutputFormat};

pub async fn handle_analyze(args: AnalyzeArgs, cfg: &AppConfig) -> Result<i32, CliError> {
    let analysis = run_analysis(&args.source, &args.rfi, args.product.as_deref(), cfg).await?;

    if let Some(out) = args.out.as_ref() {
        let body = serde_json::to_string_pretty(&analysis).map_err(anyhow::Error::from)?;
        std::fs::write(out, body)?;
        tracing::info!(path = %out.display(), "analysis written");
    }

    match args.format {
        OutputFormat::Json => {
            let body = serde_json::to_string_pretty(&analysis).map_err(anyhow::Error::from)?;
            println!("{body}");
        }
        OutputFormat::Text => print!("{}", format_analysis(&analysis)),
    }
    Ok(0)
}

pub async fn run_analysis(
    source_root: &Path,
    rfi: &str,
    product: Option<&str>,
    cfg: &AppConfig,
) -> Result<RfiAnalysis, CliError> {
    let source = factory::build_evidence_source(source_root);
    let analyzer = factory::build_analyzer(&cfg.analyzer);
    Ok(analyzer.analyze_rfi(&*source, rfi, product).await?)
}

pub fn format_analysis(analysis: &RfiAnalysis) -> String {
    let mut out = String::new();
    let Some(folder) = analysis.folder.as_ref() else {
        out.push_str(&format!("No evidence folder found for {}\n", analysis.rfi));
        return out;
    };

    out.push_str(&format!(
        "RFI {} ({} files in {})\n",
        analysis.rfi,
        analysis.entries.len() + analysis.plan.failed.len(),
        folder.id
    ));
    for entry in &analysis.entries {
        let Some(a) = entry.analysis.as_ref() else {
            continue;
        };
        out.push_str(&format!("- {} [{}]", entry.file_name, a.kind.as_str()));
        if let Some(service) = a.service.as_deref() {
            out.push_str(&format!(" service={service}"));
        }
        if let Some(instruction) = a.replication_instruction.as_ref() {
            out.push_str(&format!(" -> {}", instruction.action));
        }
        out.push('\n');
    }

    let plan = &analysis.plan;
    out.push_str(&format!("\nReplicable: {}\n", plan.items.len()));
    if !plan.needs_manual_review.is_empty() {
        out.push_str(&format!(
            "Needs manual review: {}\n",
            plan.needs_manual_review.join(", ")
        ));
    }
    if !plan.failed.is_empty() {
        out.push_str(&format!("Failed to analyze: {}\n", plan.failed.join(", ")));
    }
    out
}
