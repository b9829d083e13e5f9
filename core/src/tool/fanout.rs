use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::executor::{parse_multi_account_request, BatchStatus, ParallelExecutor};

use super::traits::ToolExecutor;
use super::types::{ParamMap, ToolResponse, STATUS_ERROR, STATUS_SUCCESS};

/// Wraps a [`ToolExecutor`] so that requests naming several accounts and
/// regions run once per (account, region) pair through a [`ParallelExecutor`].
///
/// A request that expands to a single combination is passed through as is.
pub struct FanOutToolExecutor {
    inner: Arc<dyn ToolExecutor>,
    parallel: Arc<ParallelExecutor>,
    only: Option<BTreeSet<String>>,
}

impl FanOutToolExecutor {
    pub fn new(inner: Arc<dyn ToolExecutor>, parallel: Arc<ParallelExecutor>) -> Self {
        Self {
            inner,
            parallel,
            only: None,
        }
    }

    /// Expand only requests for these tools; everything else goes straight
    /// to the inner executor.
    pub fn restrict_to<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.only = Some(tools.into_iter().map(Into::into).collect());
        self
    }

    fn expands(&self, tool_name: &str) -> bool {
        self.only
            .as_ref()
            .map_or(true, |names| names.contains(tool_name))
    }
}

#[async_trait]
impl ToolExecutor for FanOutToolExecutor {
    async fn execute_tool(
        &self,
        tool_name: &str,
        params: &ParamMap,
    ) -> anyhow::Result<ToolResponse> {
        if !self.expands(tool_name) {
            return self.inner.execute_tool(tool_name, params).await;
        }

        let expanded = parse_multi_account_request(params);
        if expanded.len() <= 1 {
            return self.inner.execute_tool(tool_name, params).await;
        }

        let inner = self.inner.clone();
        let name = tool_name.to_string();
        let outcome = self
            .parallel
            .execute_parallel(
                move |p: ParamMap| {
                    let inner = inner.clone();
                    let name = name.clone();
                    async move {
                        let response = inner.execute_tool(&name, &p).await?;
                        Ok::<_, anyhow::Error>(serde_json::to_value(response)?)
                    }
                },
                expanded,
                tool_name,
            )
            .await;

        let status = match outcome.status {
            BatchStatus::Error => STATUS_ERROR,
            BatchStatus::Success | BatchStatus::PartialSuccess => STATUS_SUCCESS,
        };
        let error = (outcome.failed > 0).then(|| {
            format!(
                "{} of {} targets failed ({})",
                outcome.failed,
                outcome.total,
                outcome.status.as_str()
            )
        });

        Ok(ToolResponse {
            status: status.to_string(),
            result: Some(serde_json::to_value(&outcome)?),
            error,
        })
    }

    fn set_current_request(&self, request: &str) {
        self.inner.set_current_request(request);
    }
}
