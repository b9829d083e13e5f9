use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "evidex", version, about = "Replay last year's audit evidence collection")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file to use instead of ~/.evidex/config.toml or ./config.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct AnalyzeArgs {
    /// Root of the prior-year evidence tree (`<root>/<product>/<rfi>/`).
    #[arg(long)]
    pub source: PathBuf,

    #[arg(long)]
    pub rfi: String,

    #[arg(long)]
    pub product: Option<String>,

    /// Also write the analysis as JSON, for `build --analysis`.
    #[arg(long)]
    pub out: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct BuildArgs {
    /// Fiscal year the playbook is filed under. Defaults to `FY<current year>`.
    #[arg(long)]
    pub fy: Option<String>,

    #[arg(long)]
    pub rfi: String,

    /// Analysis JSON written by `analyze --out`.
    #[arg(long, group = "input")]
    pub analysis: Option<PathBuf>,

    /// Analyze this evidence tree directly.
    #[arg(long, group = "input")]
    pub source: Option<PathBuf>,

    #[arg(long, requires = "source")]
    pub product: Option<String>,

    /// Where the evidence came from (SharePoint folder, ticket). Repeatable.
    #[arg(long = "source-url", action = clap::ArgAction::Append)]
    pub source_urls: Vec<String>,

    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ShowArgs {
    #[arg(long)]
    pub fy: Option<String>,

    /// Without an RFI, list the stored playbooks for the fiscal year.
    #[arg(long)]
    pub rfi: Option<String>,

    /// Show the last replay report instead of the playbook.
    #[arg(long, requires = "rfi")]
    pub report: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ReplayArgs {
    #[arg(long)]
    pub fy: Option<String>,

    #[arg(long)]
    pub rfi: String,

    /// Free-text request recorded with the run and passed to the tools.
    #[arg(long, default_value = "")]
    pub request: String,

    /// Run-time override (`account=...`, `region=...`, `start_date=...`).
    /// Can be specified multiple times.
    #[arg(long, action = clap::ArgAction::Append)]
    pub set: Vec<String>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    #[arg(long)]
    pub no_progress: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify the evidence in an RFI folder.
    Analyze(AnalyzeArgs),
    /// Build and store a playbook from analyzed evidence.
    Build(BuildArgs),
    /// Print a stored playbook or replay report.
    Show(ShowArgs),
    /// Re-run a stored playbook and write the delta report.
    Replay(ReplayArgs),
}

/// `FY<year>` for the current calendar year.
pub fn default_fiscal_year() -> String {
    format!("FY{}", chrono::Local::now().format("%Y"))
}

pub fn fiscal_year_or_default(fy: Option<&str>) -> String {
    fy.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(default_fiscal_year)
}
