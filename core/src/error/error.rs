use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("command failed: {0}")]
    Command(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("playbook error: {0}")]
    Playbook(#[from] PlaybookError),
    #[error("analysis failed: {0}")]
    Analyzer(#[from] AnalyzerError),
    #[error("replay failed: {0}")]
    Replay(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Errors raised while persisting or loading playbooks and replay reports.
#[derive(Error, Debug)]
pub enum PlaybookError {
    #[error("invalid {field}: {value:?}")]
    InvalidKey { field: &'static str, value: String },
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed json in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed csv in {path}: {source}")]
    Csv {
        path: PathBuf,
        source: csv::Error,
    },
    #[error("text extraction failed for {name}: {reason}")]
    Extraction { name: String, reason: String },
    #[error("evidence source error: {0}")]
    Source(String),
}
