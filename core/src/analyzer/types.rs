use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::playbook::DateFilters;
use crate::tool::ParamMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceType {
    #[default]
    Screenshot,
    Export,
    Document,
    Unknown,
}

impl EvidenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceType::Screenshot => "screenshot",
            EvidenceType::Export => "export",
            EvidenceType::Document => "document",
            EvidenceType::Unknown => "unknown",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "screenshot" | "image" => Some(EvidenceType::Screenshot),
            "export" | "spreadsheet" | "csv" => Some(EvidenceType::Export),
            "document" | "doc" => Some(EvidenceType::Document),
            _ => None,
        }
    }

    /// Tool that re-collects this kind of evidence.
    pub fn default_tool(&self) -> Option<&'static str> {
        match self {
            EvidenceType::Screenshot => Some("aws_console_screenshot"),
            EvidenceType::Export => Some("aws_export_data"),
            EvidenceType::Document => Some("collect_document"),
            EvidenceType::Unknown => None,
        }
    }
}

impl fmt::Display for EvidenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata record for one prior-year evidence file, as listed by an
/// [`super::EvidenceSource`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceFile {
    pub name: String,

    /// Declared MIME type.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    #[serde(default)]
    pub size: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,

    /// Local copy, when one exists. Needed for OCR and CSV header sniffing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Column names, when the source already knows them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,

    /// Pre-extracted OCR text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr_text: Option<String>,
}

impl EvidenceFile {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.name)
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
    }
}

/// Opaque pointer to an RFI folder inside an evidence source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderHandle {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentAnalysis {
    /// Service picked from the OCR keyword table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_service: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matched_keywords: Vec<String>,

    /// Semantic kind of a tabular export, e.g. `iam_users`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_excerpt: Option<String>,
}

/// What to run to collect the same evidence again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicationInstruction {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    #[serde(default)]
    pub params: ParamMap,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceAnalysis {
    #[serde(rename = "type")]
    pub kind: EvidenceType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_analysis: Option<ContentAnalysis>,

    #[serde(default)]
    pub replication_instruction: Option<ReplicationInstruction>,

    /// Curated annotations. Keys here win over every derived field when a
    /// playbook is built.
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl EvidenceAnalysis {
    pub fn is_unknown(&self) -> bool {
        self.kind == EvidenceType::Unknown
    }

    /// Human title derived from the analysis, if there is enough to go on.
    pub fn title(&self) -> Option<String> {
        if let Some(desc) = self.description.as_deref().filter(|d| !d.is_empty()) {
            return Some(match self.service.as_deref() {
                Some(service) => format!("{} {}", service.to_uppercase(), desc),
                None => desc.to_string(),
            });
        }
        let parts: Vec<&str> = [
            self.service.as_deref(),
            self.resource.as_deref(),
            self.page.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .collect();
        (!parts.is_empty()).then(|| parts.join(" "))
    }
}

/// One prior-year evidence item handed to the playbook builder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceEntry {
    pub file_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_type: Option<EvidenceType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(default)]
    pub params: ParamMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_filters: Option<DateFilters>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<EvidenceAnalysis>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanItem {
    pub file_name: String,
    #[serde(rename = "type")]
    pub kind: EvidenceType,
    pub instruction: ReplicationInstruction,
}

/// Files that can be re-collected automatically, and those that cannot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionPlan {
    pub items: Vec<PlanItem>,
    pub needs_manual_review: Vec<String>,
    /// Files whose analysis errored out.
    #[serde(default)]
    pub failed: Vec<String>,
}
