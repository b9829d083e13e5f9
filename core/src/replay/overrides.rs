use serde::{Deserialize, Serialize};

use crate::playbook::{DateFilters, PlaybookTask};
use crate::tool::{ParamMap, ParamValue};

/// Per-run parameters that take precedence over what the playbook stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit_period: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_by_date: Option<bool>,
    /// Any other `key=value` passed through to every task.
    #[serde(default, skip_serializing_if = "ParamMap::is_empty")]
    pub extra: ParamMap,
}

impl ReplayOverrides {
    /// Parse `key=value` pairs as given on the command line.
    pub fn parse(pairs: &[String]) -> Result<Self, String> {
        let mut out = Self::default();
        for raw in pairs {
            let mut it = raw.splitn(2, '=');
            let key = it.next().unwrap_or("").trim();
            let val = it.next().unwrap_or("").trim();
            if key.is_empty() || val.is_empty() {
                return Err(format!("invalid override: {}", raw));
            }

            match key {
                "account" | "aws_account" => out.account = Some(val.to_string()),
                "region" | "aws_region" => out.region = Some(val.to_string()),
                "audit_period" => out.audit_period = Some(val.to_string()),
                "start_date" => out.start_date = Some(val.to_string()),
                "end_date" => out.end_date = Some(val.to_string()),
                "date_field" => out.date_field = Some(val.to_string()),
                "filter_by_date" => out.filter_by_date = Some(parse_bool(key, val)?),
                _ => {
                    out.extra.insert(key.to_string(), ParamValue::from(val));
                }
            }
        }
        Ok(out)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn has_window(&self) -> bool {
        [&self.start_date, &self.end_date, &self.audit_period]
            .iter()
            .any(|v| v.as_deref().is_some_and(|s| !s.trim().is_empty()))
    }

    /// Parameters for one task: overrides > `task.date_filters` >
    /// `task.params` > the task's own service/account/region fields.
    ///
    /// A date window from either layer turns on `filter_by_date` only when no
    /// layer has set the flag yet.
    pub fn merge_params(&self, task: &PlaybookTask) -> ParamMap {
        let mut params = ParamMap::new();
        for (key, value) in [
            ("service", &task.service),
            ("account", &task.account),
            ("region", &task.region),
        ] {
            if !value.trim().is_empty() {
                params.insert(key.to_string(), ParamValue::from(value.as_str()));
            }
        }
        params.extend(task.params.clone());

        if let Some(filters) = task.date_filters.as_ref() {
            apply_date_filters(&mut params, filters);
        }

        for (key, value) in [
            ("account", &self.account),
            ("region", &self.region),
            ("audit_period", &self.audit_period),
            ("start_date", &self.start_date),
            ("end_date", &self.end_date),
            ("date_field", &self.date_field),
        ] {
            if let Some(v) = value.as_deref().filter(|v| !v.trim().is_empty()) {
                params.insert(key.to_string(), ParamValue::from(v));
            }
        }
        params.extend(self.extra.clone());

        match self.filter_by_date {
            Some(explicit) => {
                params.insert("filter_by_date".into(), ParamValue::Bool(explicit));
            }
            None if self.has_window() => {
                params
                    .entry("filter_by_date".into())
                    .or_insert(ParamValue::Bool(true));
            }
            None => {}
        }
        params
    }
}

fn apply_date_filters(params: &mut ParamMap, filters: &DateFilters) {
    for (key, value) in [
        ("start_date", &filters.start_date),
        ("end_date", &filters.end_date),
        ("audit_period", &filters.audit_period),
        ("date_field", &filters.date_field),
    ] {
        if let Some(v) = value.as_deref().filter(|v| !v.trim().is_empty()) {
            params.insert(key.to_string(), ParamValue::from(v));
        }
    }
    match filters.filter_by_date {
        Some(explicit) => {
            params.insert("filter_by_date".into(), ParamValue::Bool(explicit));
        }
        None if filters.has_window() => {
            params
                .entry("filter_by_date".into())
                .or_insert(ParamValue::Bool(true));
        }
        None => {}
    }
}

fn parse_bool(key: &str, val: &str) -> Result<bool, String> {
    ParamValue::from(val)
        .as_bool()
        .ok_or_else(|| format!("invalid {}: {}", key, val))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::EvidenceType;
    use crate::playbook::SourceReference;
    use pretty_assertions::assert_eq;

    fn task() -> PlaybookTask {
        let mut params = ParamMap::new();
        params.insert("account".into(), "111111111111".into());
        params.insert("start_date".into(), "2022-01-01".into());
        params.insert("resource".into(), "prod-db".into());
        PlaybookTask {
            rfi: "RFI-1".into(),
            title: "RDS snapshots".into(),
            service: "rds".into(),
            account: "111111111111".into(),
            region: "us-east-1".into(),
            evidence_type: EvidenceType::Export,
            tool: "aws_export_data".into(),
            params,
            source_reference: SourceReference::default(),
            metadata: Default::default(),
            date_filters: Some(DateFilters {
                start_date: Some("A".into()),
                end_date: Some("B".into()),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn test_override_beats_date_filters() {
        let overrides = ReplayOverrides {
            start_date: Some("C".into()),
            end_date: Some("D".into()),
            ..Default::default()
        };
        let merged = overrides.merge_params(&task());
        assert_eq!(merged["start_date"], ParamValue::from("C"));
        assert_eq!(merged["end_date"], ParamValue::from("D"));
        assert_eq!(merged["filter_by_date"], ParamValue::Bool(true));
        assert_eq!(merged["resource"], ParamValue::from("prod-db"));
    }

    #[test]
    fn test_date_filters_beat_stored_params() {
        let merged = ReplayOverrides::default().merge_params(&task());
        assert_eq!(merged["start_date"], ParamValue::from("A"));
        assert_eq!(merged["filter_by_date"], ParamValue::Bool(true));
        assert_eq!(merged["region"], ParamValue::from("us-east-1"));
    }

    #[test]
    fn test_explicit_filter_flag_is_kept() {
        let overrides = ReplayOverrides {
            audit_period: Some("FY2025".into()),
            filter_by_date: Some(false),
            account: Some("222222222222".into()),
            ..Default::default()
        };
        let merged = overrides.merge_params(&task());
        assert_eq!(merged["filter_by_date"], ParamValue::Bool(false));
        assert_eq!(merged["account"], ParamValue::from("222222222222"));
    }

    #[test]
    fn test_stored_filter_flag_survives_override_window() {
        let mut stored = task();
        stored
            .params
            .insert("filter_by_date".into(), ParamValue::Bool(false));
        let overrides = ReplayOverrides {
            start_date: Some("C".into()),
            end_date: Some("D".into()),
            ..Default::default()
        };
        let merged = overrides.merge_params(&stored);
        assert_eq!(merged["start_date"], ParamValue::from("C"));
        assert_eq!(merged["filter_by_date"], ParamValue::Bool(false));

        let merged = ReplayOverrides::default().merge_params(&stored);
        assert_eq!(merged["start_date"], ParamValue::from("A"));
        assert_eq!(merged["filter_by_date"], ParamValue::Bool(false));
    }

    #[test]
    fn test_parse_pairs() {
        let parsed = ReplayOverrides::parse(&[
            "aws_account=123".to_string(),
            "filter_by_date=no".to_string(),
            "bucket=logs".to_string(),
        ])
        .unwrap();
        assert_eq!(parsed.account.as_deref(), Some("123"));
        assert_eq!(parsed.filter_by_date, Some(false));
        assert_eq!(parsed.extra["bucket"], ParamValue::from("logs"));

        assert!(ReplayOverrides::parse(&["region".to_string()]).is_err());
        assert!(ReplayOverrides::parse(&["filter_by_date=maybe".to_string()]).is_err());
    }
}
