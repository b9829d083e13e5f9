use async_trait::async_trait;

use super::types::{ParamMap, ToolResponse};

/// The collaborator that actually performs evidence collection
/// (screenshots, exports, script runs).
///
/// Implementations are expected to report failures as a `ToolResponse` with
/// `status = "error"`. Callers still guard against `Err` and panics.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute_tool(&self, tool_name: &str, params: &ParamMap)
        -> anyhow::Result<ToolResponse>;

    /// Contextual hint for logging/telemetry; called once per replay.
    fn set_current_request(&self, _request: &str) {}
}

/// A single named action registered in a [`super::ToolRegistry`].
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    async fn invoke(&self, params: &ParamMap) -> anyhow::Result<ToolResponse>;
}
