use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Parameters handed to a tool. Ordered so persisted playbooks diff cleanly.
pub type ParamMap = BTreeMap<String, ParamValue>;

pub const STATUS_SUCCESS: &str = "success";
pub const STATUS_ERROR: &str = "error";
pub const STATUS_SKIPPED: &str = "skipped";

/// A tool parameter value: free text or a flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Text(String),
}

impl ParamValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s.as_str()),
            ParamValue::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            ParamValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Some(true),
                "false" | "0" | "no" => Some(false),
                _ => None,
            },
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, ParamValue::Text(s) if s.trim().is_empty())
    }

    /// Lossy conversion from loosely typed JSON (analysis metadata).
    /// Numbers become text; arrays, objects and null are rejected.
    pub fn from_json(v: &Value) -> Option<Self> {
        match v {
            Value::Bool(b) => Some(ParamValue::Bool(*b)),
            Value::String(s) => Some(ParamValue::Text(s.clone())),
            Value::Number(n) => Some(ParamValue::Text(n.to_string())),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Text(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Text(s)
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Bool(b)
    }
}

/// Look up a text parameter, ignoring blanks.
pub fn param_str<'a>(params: &'a ParamMap, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .and_then(ParamValue::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// What a tool hands back for one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub status: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResponse {
    pub fn success(result: Value) -> Self {
        Self {
            status: STATUS_SUCCESS.to_string(),
            result: Some(result),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: STATUS_ERROR.to_string(),
            result: None,
            error: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }

    /// Path of the produced evidence file, if the tool reported one.
    pub fn evidence_path(&self) -> Option<String> {
        let result = self.result.as_ref()?;
        ["evidence_path", "file_path", "output_path", "path"]
            .iter()
            .find_map(|k| result.get(*k).and_then(Value::as_str))
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_value_untagged_serde() {
        let params: ParamMap =
            serde_json::from_str(r#"{"account":"123","filter_by_date":true}"#).unwrap();
        assert_eq!(params["account"], ParamValue::from("123"));
        assert_eq!(params["filter_by_date"], ParamValue::Bool(true));
        assert_eq!(param_str(&params, "account"), Some("123"));
        assert_eq!(param_str(&params, "filter_by_date"), None);
    }

    #[test]
    fn test_evidence_path_lookup_order() {
        let resp = ToolResponse::success(serde_json::json!({
            "path": "/tmp/b.png",
            "evidence_path": "/tmp/a.png",
        }));
        assert_eq!(resp.evidence_path().as_deref(), Some("/tmp/a.png"));
        assert_eq!(ToolResponse::error("boom").evidence_path(), None);
    }
}
