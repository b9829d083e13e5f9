use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::AsyncReadExt;

use crate::config::AnalyzerConfig;
use crate::error::AnalyzerError;
use crate::tool::{ParamMap, ParamValue};

use super::content::{classify_columns, classify_text, excerpt, parse_csv_header};
use super::patterns::{find_account, find_region, infer_type, match_filename};
use super::source::{EvidenceSource, TextExtractor};
use super::types::{
    CollectionPlan, ContentAnalysis, EvidenceAnalysis, EvidenceEntry, EvidenceFile, EvidenceType,
    FolderHandle, PlanItem, ReplicationInstruction,
};

const EXCERPT_CHARS: usize = 280;
const CSV_HEADER_BYTES: u64 = 64 * 1024;

/// Everything learned about one RFI folder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RfiAnalysis {
    pub rfi: String,
    pub folder: Option<FolderHandle>,
    pub entries: Vec<EvidenceEntry>,
    pub plan: CollectionPlan,
}

/// Best-effort classifier for prior-year evidence files.
pub struct EvidenceAnalyzer {
    default_region: String,
    extractor: Option<Arc<dyn TextExtractor>>,
}

impl EvidenceAnalyzer {
    pub fn new(default_region: impl Into<String>) -> Self {
        Self {
            default_region: default_region.into(),
            extractor: None,
        }
    }

    pub fn from_config(cfg: &AnalyzerConfig) -> Self {
        Self::new(cfg.default_region.clone())
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn default_region(&self) -> &str {
        &self.default_region
    }

    pub async fn analyze(&self, file: &EvidenceFile) -> Result<EvidenceAnalysis, AnalyzerError> {
        let extension = file.extension();
        let file_type = infer_type(file.mime_type.as_deref(), extension.as_deref());

        let mut analysis = EvidenceAnalysis {
            region: find_region(&file.name),
            ..Default::default()
        };
        analysis
            .metadata
            .insert("original_filename".into(), json!(file.name));
        analysis
            .metadata
            .insert("file_type".into(), json!(file_type.as_str()));

        if let Some(m) = match_filename(&file.name) {
            analysis.service = m.service;
            analysis.account = m.account;
            analysis.resource = m.resource;
            analysis.page = m.page;
            analysis.description = m.description;
            analysis
                .metadata
                .insert("matched_pattern".into(), json!(m.pattern));
            for (key, value) in [("product", m.product), ("source", m.source), ("date", m.date)] {
                if let Some(v) = value {
                    analysis.metadata.insert(key.into(), json!(v));
                }
            }
        } else if file_type == EvidenceType::Screenshot {
            if let Some(text) = self.ocr_text(file).await? {
                let mut content = ContentAnalysis {
                    text_excerpt: Some(excerpt(&text, EXCERPT_CHARS)).filter(|t| !t.is_empty()),
                    ..Default::default()
                };
                if let Some(hit) = classify_text(&text) {
                    analysis.service = Some(hit.service.to_string());
                    content.detected_service = Some(hit.service.to_string());
                    content.matched_keywords = hit.keywords;
                }
                analysis.account = find_account(&text);
                if analysis.region.is_none() {
                    analysis.region = find_region(&text);
                }
                analysis.content_analysis = Some(content);
            }
        }

        if file_type == EvidenceType::Export {
            let columns = self.columns(file).await?;
            if !columns.is_empty() {
                let classified = classify_columns(&columns);
                if analysis.service.is_none() {
                    analysis.service = classified.map(|(_, service)| service.to_string());
                }
                let content = analysis.content_analysis.get_or_insert_with(Default::default);
                content.data_type = classified.map(|(data_type, _)| data_type.to_string());
                content.columns = columns;
            }
        }

        analysis.kind = if analysis.service.is_some() {
            file_type
        } else {
            EvidenceType::Unknown
        };
        analysis.replication_instruction = self.instruction_for(&analysis);

        tracing::debug!(
            file = %file.name,
            kind = %analysis.kind,
            service = ?analysis.service,
            "evidence analyzed"
        );
        Ok(analysis)
    }

    /// Analyze every file. A failure on one file is logged and yields `None`
    /// in that position.
    pub async fn analyze_batch(&self, files: &[EvidenceFile]) -> Vec<Option<EvidenceAnalysis>> {
        let mut out = Vec::with_capacity(files.len());
        for file in files {
            match self.analyze(file).await {
                Ok(a) => out.push(Some(a)),
                Err(e) => {
                    tracing::warn!(file = %file.name, error = %e, "evidence analysis failed");
                    out.push(None);
                }
            }
        }
        out
    }

    /// Locate the RFI folder in `source`, analyze its files and derive
    /// builder entries plus a collection plan. A missing folder is not an
    /// error; the result is simply empty.
    pub async fn analyze_rfi(
        &self,
        source: &dyn EvidenceSource,
        rfi: &str,
        product: Option<&str>,
    ) -> Result<RfiAnalysis, AnalyzerError> {
        let Some(folder) = source.find_rfi_folder(rfi, product).await? else {
            tracing::warn!(rfi = %rfi, source = %source.name(), "no evidence folder found");
            return Ok(RfiAnalysis {
                rfi: rfi.to_string(),
                ..Default::default()
            });
        };

        let files = source.list_evidence(&folder).await?;
        tracing::info!(rfi = %rfi, files = files.len(), folder = %folder.name, "analyzing evidence");

        let analyses = self.analyze_batch(&files).await;
        let plan = build_collection_plan(&files, &analyses);

        let entries = files
            .iter()
            .zip(analyses)
            .filter_map(|(file, analysis)| {
                analysis.map(|analysis| EvidenceEntry {
                    file_name: file.name.clone(),
                    source_path: file
                        .path
                        .as_ref()
                        .map(|p| p.to_string_lossy().to_string()),
                    source_url: file.url.clone(),
                    analysis: Some(analysis),
                    ..Default::default()
                })
            })
            .collect();

        Ok(RfiAnalysis {
            rfi: rfi.to_string(),
            folder: Some(folder),
            entries,
            plan,
        })
    }

    async fn ocr_text(&self, file: &EvidenceFile) -> Result<Option<String>, AnalyzerError> {
        if let Some(text) = file.ocr_text.as_ref() {
            return Ok(Some(text.clone()));
        }
        match self.extractor.as_ref() {
            Some(extractor) => extractor.extract_text(file).await.map(Some),
            None => Ok(None),
        }
    }

    async fn columns(&self, file: &EvidenceFile) -> Result<Vec<String>, AnalyzerError> {
        if !file.columns.is_empty() {
            return Ok(file.columns.clone());
        }
        let is_csv = matches!(file.extension().as_deref(), Some("csv"));
        match file.path.as_deref() {
            Some(path) if is_csv => read_csv_header(path).await,
            _ => Ok(Vec::new()),
        }
    }

    fn instruction_for(&self, analysis: &EvidenceAnalysis) -> Option<ReplicationInstruction> {
        let action = analysis.kind.default_tool()?;
        let region = analysis
            .region
            .clone()
            .unwrap_or_else(|| self.default_region.clone());

        let mut params = ParamMap::new();
        let fields = [
            ("service", analysis.service.as_deref()),
            ("account", analysis.account.as_deref()),
            ("region", Some(region.as_str())),
            ("resource", analysis.resource.as_deref()),
            ("page", analysis.page.as_deref()),
            (
                "data_type",
                analysis
                    .content_analysis
                    .as_ref()
                    .and_then(|c| c.data_type.as_deref()),
            ),
        ];
        for (key, value) in fields {
            if let Some(v) = value.filter(|v| !v.is_empty()) {
                params.insert(key.to_string(), ParamValue::from(v));
            }
        }

        Some(ReplicationInstruction {
            action: action.to_string(),
            service: analysis.service.clone(),
            account: analysis.account.clone(),
            region: Some(region),
            resource: analysis.resource.clone(),
            page: analysis.page.clone(),
            params,
        })
    }
}

impl Default for EvidenceAnalyzer {
    fn default() -> Self {
        Self::new(crate::config::default_region())
    }
}

async fn read_csv_header(path: &Path) -> Result<Vec<String>, AnalyzerError> {
    let io_err = |source| AnalyzerError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = tokio::fs::File::open(path).await.map_err(io_err)?;
    let mut head = Vec::new();
    file.take(CSV_HEADER_BYTES)
        .read_to_end(&mut head)
        .await
        .map_err(io_err)?;
    parse_csv_header(&head).map_err(|source| AnalyzerError::Csv {
        path: path.to_path_buf(),
        source,
    })
}

/// Split analyses into automatable items and files that need a human.
pub fn build_collection_plan(
    files: &[EvidenceFile],
    analyses: &[Option<EvidenceAnalysis>],
) -> CollectionPlan {
    let mut plan = CollectionPlan::default();
    for (file, analysis) in files.iter().zip(analyses) {
        match analysis {
            None => plan.failed.push(file.name.clone()),
            Some(a) => match a.replication_instruction.as_ref() {
                Some(instruction) if !a.is_unknown() => plan.items.push(PlanItem {
                    file_name: file.name.clone(),
                    kind: a.kind,
                    instruction: instruction.clone(),
                }),
                _ => plan.needs_manual_review.push(file.name.clone()),
            },
        }
    }
    plan
}

/// Value of a metadata key as a trimmed, non-empty string.
pub(crate) fn metadata_str<'a>(
    metadata: &'a std::collections::BTreeMap<String, Value>,
    key: &str,
) -> Option<&'a str> {
    metadata
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
