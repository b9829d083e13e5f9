use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use evidex_core::tool::{ParamMap, Tool, ToolResponse};

/// Records what would have been collected instead of collecting it. Each
/// call writes `<evidence_dir>/<tool>/<timestamp>_<id>.json` and reports that
/// file as the evidence path.
pub struct ManifestTool {
    name: String,
    evidence_dir: PathBuf,
}

impl ManifestTool {
    pub fn new(name: impl Into<String>, evidence_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            evidence_dir: evidence_dir.into(),
        }
    }
}

#[async_trait]
impl Tool for ManifestTool {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, params: &ParamMap) -> Result<ToolResponse> {
        let now = Utc::now();
        let id = uuid::Uuid::new_v4().simple().to_string();
        let dir = self.evidence_dir.join(&self.name);
        let path = dir.join(format!("{}_{}.json", now.format("%Y%m%dT%H%M%S"), &id[..8]));

        let manifest = json!({
            "tool": self.name,
            "params": params,
            "created_at": now.to_rfc3339(),
        });

        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("failed to create {}", dir.display()))?;
        tokio::fs::write(&path, serde_json::to_vec_pretty(&manifest)?)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;

        tracing::debug!(tool = %self.name, path = %path.display(), "manifest written");
        Ok(ToolResponse::success(json!({
            "evidence_path": path.to_string_lossy(),
            "dry_run": true,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evidex_core::tool::ParamValue;

    #[tokio::test]
    async fn test_writes_manifest_and_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ManifestTool::new("aws_console_screenshot", dir.path());
        let mut params = ParamMap::new();
        params.insert("service".into(), ParamValue::from("rds"));
        params.insert("filter_by_date".into(), ParamValue::Bool(true));

        let resp = tool.invoke(&params).await.unwrap();
        assert!(resp.is_success());

        let path = PathBuf::from(resp.evidence_path().unwrap());
        assert!(path.starts_with(dir.path().join("aws_console_screenshot")));
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["tool"], "aws_console_screenshot");
        assert_eq!(written["params"]["service"], "rds");
        assert_eq!(written["params"]["filter_by_date"], true);
    }

    #[tokio::test]
    async fn test_each_call_gets_its_own_file() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ManifestTool::new("collect_document", dir.path());
        let a = tool.invoke(&ParamMap::new()).await.unwrap().evidence_path();
        let b = tool.invoke(&ParamMap::new()).await.unwrap().evidence_path();
        assert_ne!(a, b);
    }
}
