use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use evidex_core::analyzer::{EvidenceFile, EvidenceSource, FolderHandle};
use evidex_core::error::AnalyzerError;

/// Prior-year evidence kept on disk as `<root>/<product>/<rfi>/`.
///
/// Without a product, `<root>/<rfi>/` is tried first and then every
/// product directory directly under the root.
pub struct LocalEvidenceSource {
    root: PathBuf,
}

impl LocalEvidenceSource {
    pub fn new(root: impl AsRef<str>) -> Self {
        Self {
            root: PathBuf::from(shellexpand::tilde(root.as_ref()).as_ref()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn candidates(&self, product: Option<&str>) -> Result<Vec<PathBuf>, AnalyzerError> {
        if let Some(product) = product.map(str::trim).filter(|p| !p.is_empty()) {
            return Ok(vec![self.root.join(product)]);
        }

        let mut out = vec![self.root.clone()];
        for dir in list_dirs(&self.root).await? {
            out.push(dir);
        }
        Ok(out)
    }
}

#[async_trait]
impl EvidenceSource for LocalEvidenceSource {
    fn name(&self) -> &str {
        "local"
    }

    async fn find_rfi_folder(
        &self,
        rfi: &str,
        product: Option<&str>,
    ) -> Result<Option<FolderHandle>, AnalyzerError> {
        let rfi = rfi.trim();
        if rfi.is_empty() {
            return Ok(None);
        }

        for parent in self.candidates(product).await? {
            // Folder names on shared drives are rarely consistent in case.
            let found = list_dirs(&parent).await?.into_iter().find(|dir| {
                dir.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.eq_ignore_ascii_case(rfi))
            });
            if let Some(dir) = found {
                tracing::debug!(rfi = %rfi, path = %dir.display(), "rfi folder found");
                return Ok(Some(FolderHandle {
                    id: dir.to_string_lossy().to_string(),
                    name: rfi.to_string(),
                    path: Some(dir),
                    url: None,
                }));
            }
        }
        Ok(None)
    }

    async fn list_evidence(
        &self,
        folder: &FolderHandle,
    ) -> Result<Vec<EvidenceFile>, AnalyzerError> {
        let dir = folder
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from(&folder.id));
        let io_err = |source| AnalyzerError::Io {
            path: dir.clone(),
            source,
        };

        let mut entries = tokio::fs::read_dir(&dir).await.map_err(io_err)?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            let meta = entry.metadata().await.map_err(io_err)?;
            if !meta.is_file() {
                continue;
            }
            let path = entry.path();
            files.push(EvidenceFile {
                mime_type: guess_mime(&path).map(str::to_string),
                size: meta.len(),
                modified: meta.modified().ok().map(DateTime::<Utc>::from),
                path: Some(path),
                ..EvidenceFile::named(name)
            });
        }
        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }
}

async fn list_dirs(parent: &Path) -> Result<Vec<PathBuf>, AnalyzerError> {
    let mut entries = match tokio::fs::read_dir(parent).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(AnalyzerError::Io {
                path: parent.to_path_buf(),
                source,
            })
        }
    };

    let mut dirs = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|source| AnalyzerError::Io {
            path: parent.to_path_buf(),
            source,
        })?
    {
        let is_dir = entry
            .file_type()
            .await
            .map(|t| t.is_dir())
            .unwrap_or(false);
        if is_dir {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn guess_mime(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "csv" => "text/csv",
        "json" => "application/json",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "xls" => "application/vnd.ms-excel",
        "pdf" => "application/pdf",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "txt" => "text/plain",
        _ => return None,
    };
    Some(mime)
}
