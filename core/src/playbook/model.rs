use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::analyzer::EvidenceType;
use crate::tool::ParamMap;

/// Date constraints applied to a task at replay time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit_period: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_by_date: Option<bool>,
}

impl DateFilters {
    /// True when a range or an audit period is present.
    pub fn has_window(&self) -> bool {
        [&self.start_date, &self.end_date, &self.audit_period]
            .iter()
            .any(|v| v.as_deref().is_some_and(|s| !s.trim().is_empty()))
    }
}

/// Where the prior-year evidence came from. Informational only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybookTask {
    pub rfi: String,
    pub title: String,
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub account: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub evidence_type: EvidenceType,
    #[serde(default)]
    pub tool: String,
    #[serde(default)]
    pub params: ParamMap,
    #[serde(default)]
    pub source_reference: SourceReference,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_filters: Option<DateFilters>,
}

impl PlaybookTask {
    /// Required fields that are blank. A task is replayable only when this
    /// is empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("tool", &self.tool),
            ("service", &self.service),
            ("account", &self.account),
            ("region", &self.region),
        ]
        .into_iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(k, _)| k)
        .collect()
    }

    pub fn is_replayable(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Identity that survives a title rename.
    pub fn task_key(&self) -> String {
        format!("{}|{}|{}|{}", self.tool, self.service, self.account, self.region)
    }
}

/// Ordered collection tasks for one `(fiscal_year, rfi)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playbook {
    pub fiscal_year: String,
    pub rfi: String,
    #[serde(default)]
    pub tasks: Vec<PlaybookTask>,
    #[serde(default)]
    pub source_urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> PlaybookTask {
        PlaybookTask {
            rfi: "RFI-1".into(),
            title: "RDS Backup Policy".into(),
            service: "rds".into(),
            account: "123456789012".into(),
            region: "us-east-1".into(),
            evidence_type: EvidenceType::Screenshot,
            tool: "aws_console_screenshot".into(),
            params: ParamMap::new(),
            source_reference: SourceReference::default(),
            metadata: BTreeMap::new(),
            date_filters: None,
        }
    }

    #[test]
    fn test_missing_fields() {
        let mut t = task();
        assert!(t.is_replayable());
        t.account = " ".into();
        t.tool.clear();
        assert_eq!(t.missing_fields(), vec!["tool", "account"]);
    }

    #[test]
    fn test_task_key_ignores_title() {
        let a = task();
        let mut b = task();
        b.title = "Renamed".into();
        assert_eq!(a.task_key(), b.task_key());
    }

    #[test]
    fn test_date_window() {
        assert!(!DateFilters::default().has_window());
        let f = DateFilters {
            audit_period: Some("FY2024".into()),
            ..Default::default()
        };
        assert!(f.has_window());
    }
}
