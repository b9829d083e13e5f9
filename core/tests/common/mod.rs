#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use evidex_core::analyzer::{
    EvidenceAnalysis, EvidenceEntry, EvidenceType, ReplicationInstruction,
};
use evidex_core::playbook::{build_playbook, Playbook, PlaybookStore};
use evidex_core::tool::{ParamMap, ToolExecutor, ToolResponse};

/// How the scripted executor answers for one tool name.
#[derive(Clone)]
pub enum Script {
    Ok(&'static str),
    Fail(&'static str),
    Err(&'static str),
    Panic,
}

/// Tool executor that answers from a per-tool script and records calls.
#[derive(Default)]
pub struct ScriptedExecutor {
    scripts: Mutex<HashMap<String, Script>>,
    pub calls: Mutex<Vec<(String, ParamMap)>>,
    pub requests: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, tool: &str, script: Script) {
        self.scripts.lock().unwrap().insert(tool.to_string(), script);
    }

    pub fn calls(&self) -> Vec<(String, ParamMap)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolExecutor for ScriptedExecutor {
    async fn execute_tool(&self, tool_name: &str, params: &ParamMap) -> anyhow::Result<ToolResponse> {
        self.calls
            .lock()
            .unwrap()
            .push((tool_name.to_string(), params.clone()));
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(tool_name)
            .cloned()
            .unwrap_or(Script::Ok("/evidence/default.png"));
        match script {
            Script::Ok(path) => Ok(ToolResponse::success(json!({ "evidence_path": path }))),
            Script::Fail(msg) => Ok(ToolResponse::error(msg)),
            Script::Err(msg) => Err(anyhow::anyhow!(msg)),
            Script::Panic => panic!("scripted panic"),
        }
    }

    fn set_current_request(&self, request: &str) {
        self.requests.lock().unwrap().push(request.to_string());
    }
}

pub fn entry(file: &str, tool: &str, service: &str, account: Option<&str>) -> EvidenceEntry {
    EvidenceEntry {
        file_name: file.to_string(),
        analysis: Some(EvidenceAnalysis {
            kind: EvidenceType::Screenshot,
            service: Some(service.to_string()),
            account: account.map(str::to_string),
            description: Some(file.trim_end_matches(".png").replace('_', " ")),
            replication_instruction: Some(ReplicationInstruction {
                action: tool.to_string(),
                service: Some(service.to_string()),
                account: account.map(str::to_string),
                region: Some("us-east-1".to_string()),
                resource: None,
                page: None,
                params: ParamMap::new(),
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn store(dir: &tempfile::TempDir) -> PlaybookStore {
    PlaybookStore::new(dir.path().join("playbooks"), dir.path().join("reports"))
}

pub fn saved_playbook(store: &PlaybookStore, rfi: &str, entries: &[EvidenceEntry]) -> Playbook {
    let pb = build_playbook("FY2024", rfi, entries, vec![], None);
    store.save_playbook(&pb).unwrap();
    pb
}
