use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::OnceCell;

use super::traits::{Tool, ToolExecutor};
use super::types::{ParamMap, ToolResponse};

type ToolFactory = Box<dyn Fn() -> anyhow::Result<Arc<dyn Tool>> + Send + Sync>;

struct ToolEntry {
    factory: ToolFactory,
    instance: OnceCell<Arc<dyn Tool>>,
}

/// Name → factory table. A tool is built on first use and cached for the
/// lifetime of the registry.
#[derive(Default)]
pub struct ToolRegistry {
    entries: BTreeMap<String, ToolEntry>,
    current_request: Mutex<Option<String>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a lazily constructed tool. Re-registering a name replaces it.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> anyhow::Result<Arc<dyn Tool>> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.entries.contains_key(&name) {
            tracing::warn!(tool = %name, "replacing previously registered tool");
        }
        self.entries.insert(
            name,
            ToolEntry {
                factory: Box::new(factory),
                instance: OnceCell::new(),
            },
        );
    }

    /// Register an already constructed tool under its own name.
    pub fn register_tool(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.register(name, move || Ok(tool.clone()));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.entries
            .get(name)
            .map(|e| e.instance.initialized())
            .unwrap_or(false)
    }

    pub fn current_request(&self) -> Option<String> {
        self.current_request
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
    }

    /// Resolve a tool, constructing it on first access.
    pub async fn resolve(&self, name: &str) -> Option<anyhow::Result<Arc<dyn Tool>>> {
        let entry = self.entries.get(name)?;
        let tool = entry
            .instance
            .get_or_try_init(|| async {
                tracing::debug!(tool = %name, "loading tool");
                (entry.factory)()
            })
            .await
            .cloned();
        Some(tool)
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    async fn execute_tool(
        &self,
        tool_name: &str,
        params: &ParamMap,
    ) -> anyhow::Result<ToolResponse> {
        let tool = match self.resolve(tool_name).await {
            None => return Ok(ToolResponse::error(format!("unknown tool: {tool_name}"))),
            Some(Err(e)) => {
                tracing::error!(tool = %tool_name, error = %e, "tool failed to initialize");
                return Ok(ToolResponse::error(format!(
                    "tool {tool_name} failed to initialize: {e}"
                )));
            }
            Some(Ok(tool)) => tool,
        };

        tracing::info!(
            tool = %tool_name,
            request = ?self.current_request(),
            "executing tool"
        );
        tool.invoke(params).await
    }

    fn set_current_request(&self, request: &str) {
        if let Ok(mut guard) = self.current_request.lock() {
            *guard = Some(request.to_string());
        }
    }
}
