use std::collections::BTreeMap;

use chrono::Utc;
use serde_json::{json, Value};

use crate::analyzer::{metadata_str, EvidenceAnalysis, EvidenceEntry, EvidenceType};
use crate::tool::ParamValue;

use super::model::{DateFilters, Playbook, PlaybookTask, SourceReference};

/// Turns analyzed evidence entries into a [`Playbook`].
///
/// Each field is resolved from, in order: `analysis.metadata`, the analysis
/// itself and its replication instruction, the entry, then defaults.
#[derive(Debug, Clone)]
pub struct PlaybookBuilder {
    default_region: String,
}

impl PlaybookBuilder {
    pub fn new(default_region: impl Into<String>) -> Self {
        Self {
            default_region: default_region.into(),
        }
    }

    pub fn build(
        &self,
        fiscal_year: &str,
        rfi: &str,
        entries: &[EvidenceEntry],
        source_urls: Vec<String>,
        notes: Option<String>,
    ) -> Playbook {
        let tasks: Vec<PlaybookTask> = entries
            .iter()
            .filter_map(|entry| {
                let task = self.task_from_entry(rfi, entry);
                if task.is_none() {
                    tracing::debug!(file = %entry.file_name, "entry has no tool, dropped");
                }
                task
            })
            .collect();

        tracing::info!(
            fiscal_year = %fiscal_year,
            rfi = %rfi,
            entries = entries.len(),
            tasks = tasks.len(),
            "playbook built"
        );

        Playbook {
            fiscal_year: fiscal_year.to_string(),
            rfi: rfi.to_string(),
            tasks,
            source_urls,
            notes,
            created_at: Utc::now(),
        }
    }

    fn task_from_entry(&self, rfi: &str, entry: &EvidenceEntry) -> Option<PlaybookTask> {
        let analysis = entry.analysis.as_ref();
        let empty = BTreeMap::new();
        let meta = analysis.map(|a| &a.metadata).unwrap_or(&empty);
        let instruction = analysis.and_then(|a| a.replication_instruction.as_ref());

        let tool = first([
            metadata_str(meta, "tool"),
            metadata_str(meta, "action"),
            instruction.map(|i| i.action.as_str()),
            entry.tool.as_deref(),
        ])?;

        let pick = |key: &str, from_analysis: Option<&str>, from_entry: Option<&str>| {
            first([
                metadata_str(meta, key),
                from_analysis,
                instruction
                    .and_then(|i| i.params.get(key))
                    .and_then(ParamValue::as_str),
                from_entry,
            ])
        };

        let service = pick(
            "service",
            analysis.and_then(|a| a.service.as_deref()),
            entry.service.as_deref(),
        );
        let account = pick(
            "account",
            analysis.and_then(|a| a.account.as_deref()),
            entry.account.as_deref(),
        );
        let region = pick(
            "region",
            analysis.and_then(|a| a.region.as_deref()),
            entry.region.as_deref(),
        )
        .unwrap_or_else(|| self.default_region.clone());
        let resource = pick("resource", analysis.and_then(|a| a.resource.as_deref()), None);
        let page = pick("page", analysis.and_then(|a| a.page.as_deref()), None);

        let evidence_type = metadata_str(meta, "evidence_type")
            .and_then(EvidenceType::parse)
            .or_else(|| analysis.map(|a| a.kind).filter(|k| *k != EvidenceType::Unknown))
            .or(entry.evidence_type.filter(|k| *k != EvidenceType::Unknown))
            .unwrap_or_default();

        let title = first([metadata_str(meta, "title")])
            .or_else(|| analysis.and_then(EvidenceAnalysis::title))
            .or_else(|| entry.title.clone().filter(|t| !t.trim().is_empty()))
            .unwrap_or_else(|| entry.file_name.clone());

        // Lowest precedence first so later inserts win.
        let mut params = entry.params.clone();
        if let Some(i) = instruction {
            params.extend(i.params.clone());
        }
        if let Some(Value::Object(extra)) = meta.get("params") {
            params.extend(
                extra
                    .iter()
                    .filter_map(|(k, v)| ParamValue::from_json(v).map(|p| (k.clone(), p))),
            );
        }
        for (key, value) in [
            ("service", service.as_deref()),
            ("account", account.as_deref()),
            ("region", Some(region.as_str())),
            ("resource", resource.as_deref()),
            ("page", page.as_deref()),
        ] {
            if let Some(v) = value {
                params.insert(key.to_string(), ParamValue::from(v));
            }
        }

        let date_filters = meta
            .get("date_filters")
            .and_then(|v| serde_json::from_value::<DateFilters>(v.clone()).ok())
            .or_else(|| entry.date_filters.clone());

        Some(PlaybookTask {
            rfi: rfi.to_string(),
            title,
            service: service.unwrap_or_default(),
            account: account.unwrap_or_default(),
            region,
            evidence_type,
            tool,
            params,
            source_reference: SourceReference {
                file_name: Some(entry.file_name.clone()),
                path: entry.source_path.clone(),
                url: entry.source_url.clone(),
            },
            metadata: task_metadata(entry, meta),
            date_filters,
        })
    }
}

impl Default for PlaybookBuilder {
    fn default() -> Self {
        Self::new(crate::config::default_region())
    }
}

/// Build a playbook with the default region fallback.
pub fn build_playbook(
    fiscal_year: &str,
    rfi: &str,
    entries: &[EvidenceEntry],
    source_urls: Vec<String>,
    notes: Option<String>,
) -> Playbook {
    PlaybookBuilder::default().build(fiscal_year, rfi, entries, source_urls, notes)
}

fn first<'a, const N: usize>(candidates: [Option<&'a str>; N]) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn task_metadata(entry: &EvidenceEntry, meta: &BTreeMap<String, Value>) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    out.insert("original_filename".to_string(), json!(entry.file_name));
    for (key, fallback) in [
        ("summary", entry.summary.as_deref()),
        ("instructions", entry.instructions.as_deref()),
    ] {
        if let Some(v) = first([metadata_str(meta, key), fallback]) {
            out.insert(key.to_string(), json!(v));
        }
    }
    if let Some(data_type) = entry
        .analysis
        .as_ref()
        .and_then(|a| a.content_analysis.as_ref())
        .and_then(|c| c.data_type.as_deref())
    {
        out.insert("data_type".to_string(), json!(data_type));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::ReplicationInstruction;
    use crate::tool::ParamMap;
    use pretty_assertions::assert_eq;

    fn analyzed(name: &str) -> EvidenceEntry {
        let mut instruction_params = ParamMap::new();
        instruction_params.insert("region".into(), "eu-west-1".into());
        instruction_params.insert("data_type".into(), "iam_users".into());
        EvidenceEntry {
            file_name: name.into(),
            account: Some("999999999999".into()),
            analysis: Some(EvidenceAnalysis {
                kind: EvidenceType::Export,
                service: Some("iam".into()),
                account: Some("111111111111".into()),
                replication_instruction: Some(ReplicationInstruction {
                    action: "aws_export_data".into(),
                    service: Some("iam".into()),
                    account: Some("111111111111".into()),
                    region: Some("eu-west-1".into()),
                    resource: None,
                    page: None,
                    params: instruction_params,
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_field_precedence() {
        let mut entry = analyzed("users.csv");
        if let Some(a) = entry.analysis.as_mut() {
            a.metadata.insert("account".into(), json!("222222222222"));
            a.metadata.insert("title".into(), json!("IAM users with MFA"));
        }

        let pb = build_playbook("FY2024", "RFI-7", &[entry], vec![], None);
        let task = &pb.tasks[0];
        assert_eq!(task.account, "222222222222");
        assert_eq!(task.region, "eu-west-1");
        assert_eq!(task.title, "IAM users with MFA");
        assert_eq!(task.tool, "aws_export_data");
        assert_eq!(task.evidence_type, EvidenceType::Export);
        assert_eq!(task.params.get("account"), Some(&ParamValue::from("222222222222")));
        assert_eq!(task.params.get("data_type"), Some(&ParamValue::from("iam_users")));
    }

    #[test]
    fn test_entry_fields_and_defaults() {
        let entry = EvidenceEntry {
            file_name: "kms.png".into(),
            tool: Some("aws_console_screenshot".into()),
            service: Some("kms".into()),
            account: Some("333333333333".into()),
            ..Default::default()
        };
        let task = &PlaybookBuilder::new("ap-south-1")
            .build("FY2024", "RFI-8", &[entry], vec![], None)
            .tasks[0];
        assert_eq!(task.region, "ap-south-1");
        assert_eq!(task.evidence_type, EvidenceType::Screenshot);
        assert_eq!(task.title, "kms.png");
        assert!(task.is_replayable());
    }

    #[test]
    fn test_entries_without_tool_are_dropped() {
        let entries = vec![
            EvidenceEntry::default(),
            analyzed("users.csv"),
            EvidenceEntry {
                file_name: "unknown.bin".into(),
                analysis: Some(EvidenceAnalysis {
                    kind: EvidenceType::Unknown,
                    ..Default::default()
                }),
                ..Default::default()
            },
        ];
        let pb = build_playbook("FY2024", "RFI-9", &entries, vec!["https://x".into()], None);
        assert_eq!(pb.tasks.len(), 1);
        assert_eq!(pb.source_urls, vec!["https://x".to_string()]);
    }

    #[test]
    fn test_empty_entries() {
        let pb = build_playbook("FY2024", "RFI-0", &[], vec![], Some("nothing yet".into()));
        assert!(pb.tasks.is_empty());
        assert_eq!(pb.notes.as_deref(), Some("nothing yet"));
    }
}
