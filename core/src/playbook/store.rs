use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::config::StoragePaths;
use crate::error::PlaybookError;

use super::model::Playbook;

/// On-disk layout:
///
/// ```text
/// <playbooks_dir>/<fiscal_year>/<rfi>.json
/// <reports_dir>/<fiscal_year>/<rfi>_replay.json
/// ```
#[derive(Debug, Clone)]
pub struct PlaybookStore {
    playbooks_dir: PathBuf,
    reports_dir: PathBuf,
}

impl PlaybookStore {
    pub fn new(playbooks_dir: impl Into<PathBuf>, reports_dir: impl Into<PathBuf>) -> Self {
        Self {
            playbooks_dir: playbooks_dir.into(),
            reports_dir: reports_dir.into(),
        }
    }

    pub fn from_paths(paths: &StoragePaths) -> Self {
        Self::new(paths.playbooks_dir.clone(), paths.reports_dir.clone())
    }

    pub fn playbook_path(&self, fiscal_year: &str, rfi: &str) -> Result<PathBuf, PlaybookError> {
        Ok(self
            .playbooks_dir
            .join(validate_key("fiscal_year", fiscal_year)?)
            .join(format!("{}.json", validate_key("rfi", rfi)?)))
    }

    pub fn report_path(&self, fiscal_year: &str, rfi: &str) -> Result<PathBuf, PlaybookError> {
        Ok(self
            .reports_dir
            .join(validate_key("fiscal_year", fiscal_year)?)
            .join(format!("{}_replay.json", validate_key("rfi", rfi)?)))
    }

    /// Write the playbook, replacing whatever was there.
    pub fn save_playbook(&self, playbook: &Playbook) -> Result<PathBuf, PlaybookError> {
        let path = self.playbook_path(&playbook.fiscal_year, &playbook.rfi)?;
        write_json(&path, playbook)?;
        tracing::info!(path = %path.display(), tasks = playbook.tasks.len(), "playbook saved");
        Ok(path)
    }

    /// `Ok(None)` when no playbook exists for the pair.
    pub fn load_playbook(
        &self,
        fiscal_year: &str,
        rfi: &str,
    ) -> Result<Option<Playbook>, PlaybookError> {
        read_json(&self.playbook_path(fiscal_year, rfi)?)
    }

    /// RFIs with a stored playbook for `fiscal_year`, sorted.
    pub fn list_playbooks(&self, fiscal_year: &str) -> Result<Vec<String>, PlaybookError> {
        let dir = self
            .playbooks_dir
            .join(validate_key("fiscal_year", fiscal_year)?);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(PlaybookError::Io { path: dir, source }),
        };

        let mut out = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| PlaybookError::Io {
                path: dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    out.push(stem.to_string());
                }
            }
        }
        out.sort();
        Ok(out)
    }

    /// Previous report as raw JSON, kept verbatim for embedding.
    pub fn load_report(&self, fiscal_year: &str, rfi: &str) -> Result<Option<Value>, PlaybookError> {
        read_json(&self.report_path(fiscal_year, rfi)?)
    }

    pub fn save_report<T: Serialize>(
        &self,
        fiscal_year: &str,
        rfi: &str,
        report: &T,
    ) -> Result<PathBuf, PlaybookError> {
        let path = self.report_path(fiscal_year, rfi)?;
        write_json(&path, report)?;
        tracing::info!(path = %path.display(), "replay report saved");
        Ok(path)
    }
}

/// Keys become path components verbatim. Anything outside `[A-Za-z0-9._-]`
/// is rejected rather than rewritten so two keys never share a file.
fn validate_key(field: &'static str, raw: &str) -> Result<String, PlaybookError> {
    let key = raw.trim();
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.');
    if key.is_empty() || key.chars().all(|c| c == '.') || !key.chars().all(allowed) {
        return Err(PlaybookError::InvalidKey {
            field,
            value: raw.to_string(),
        });
    }
    Ok(key.to_string())
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), PlaybookError> {
    let io_err = |source| PlaybookError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let body = serde_json::to_string_pretty(value).map_err(|source| PlaybookError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, body).map_err(io_err)?;
    std::fs::rename(&tmp, path).map_err(io_err)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, PlaybookError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(PlaybookError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| PlaybookError::Json {
            path: path.to_path_buf(),
            source,
        })
}
