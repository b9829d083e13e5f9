use evidex_core::config::AppConfig;
use evidex_core::error::CliError;
use evidex_core::playbook::{Playbook, PlaybookStore};
use evidex_core::replay::{format_text, ReplaySummary};

use crate::commands::cli::{fiscal_year_or_default, OutputFormat, ShowArgs};

pub fn handle_show(args: ShowArgs, cfg: &AppConfig) -> Result<i32, CliError> {
    let store = PlaybookStore::from_paths(&cfg.storage.resolved());
    let fiscal_year = fiscal_year_or_default(args.fy.as_deref());

    let Some(rfi) = args.rfi.as_deref() else {
        let rfis = store.list_playbooks(&fiscal_year)?;
        match args.format {
            OutputFormat::Json => println!("{}", to_json(&rfis)?),
            OutputFormat::Text if rfis.is_empty() => println!("No playbooks for {fiscal_year}"),
            OutputFormat::Text => rfis.iter().for_each(|rfi| println!("{rfi}")),
        }
        return Ok(0);
    };

    if args.report {
        let Some(report) = store.load_report(&fiscal_year, rfi)? else {
            eprintln!("No replay report for {fiscal_year} / {rfi}");
            return Ok(1);
        };
        match args.format {
            OutputFormat::Json => println!("{}", to_json(&report)?),
            OutputFormat::Text => match serde_json::from_value::<ReplaySummary>(report) {
                Ok(summary) => print!("{}", format_text(&summary)),
                Err(e) => {
                    return Err(CliError::Command(format!("unreadable replay report: {e}")));
                }
            },
        }
        return Ok(0);
    }

    let Some(playbook) = store.load_playbook(&fiscal_year, rfi)? else {
        eprintln!("No playbook for {fiscal_year} / {rfi}");
        return Ok(1);
    };
    match args.format {
        OutputFormat::Json => println!("{}", to_json(&playbook)?),
        OutputFormat::Text => print!("{}", format_playbook(&playbook)),
    }
    Ok(0)
}

pub fn format_playbook(playbook: &Playbook) -> String {
    let mut out = format!(
        "Playbook {} / {} ({} tasks, created {})\n",
        playbook.fiscal_year,
        playbook.rfi,
        playbook.tasks.len(),
        playbook.created_at.to_rfc3339()
    );
    for task in &playbook.tasks {
        out.push_str(&format!(
            "- {} [{}] {} {}/{}",
            task.title, task.tool, task.service, task.account, task.region
        ));
        let missing = task.missing_fields();
        if !missing.is_empty() {
            out.push_str(&format!(" (missing: {})", missing.join(", ")));
        }
        out.push('\n');
    }
    if let Some(notes) = playbook.notes.as_deref() {
        out.push_str(&format!("\nNotes: {notes}\n"));
    }
    out
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, CliError> {
    Ok(serde_json::to_string_pretty(value).map_err(anyhow::Error::from)?)
}
