use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use evidex_core::tool::{ParamMap, Tool, ToolResponse};

const STDERR_TAIL_CHARS: usize = 2000;

/// An external collector program. Parameters go in as one JSON object on
/// stdin and a JSON tool response is expected on stdout.
pub struct CommandTool {
    name: String,
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl CommandTool {
    pub fn new(
        name: impl Into<String>,
        program: impl Into<String>,
        args: Vec<String>,
        timeout_secs: Option<u64>,
    ) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args,
            timeout: timeout_secs.filter(|s| *s > 0).map(Duration::from_secs),
        }
    }
}

#[async_trait]
impl Tool for CommandTool {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, params: &ParamMap) -> Result<ToolResponse> {
        let payload = serde_json::to_vec(params)?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env("EVIDEX_TOOL", &self.name)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to start {}", self.program))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&payload).await?;
            stdin.shutdown().await?;
        }

        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(out) => out?,
                Err(_) => {
                    tracing::warn!(tool = %self.name, secs = limit.as_secs(), "tool timed out");
                    return Ok(ToolResponse::error(format!(
                        "{} timed out after {}s",
                        self.name,
                        limit.as_secs()
                    )));
                }
            },
            None => child.wait_with_output().await?,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Ok(ToolResponse::error(format!(
                "{} exited with {}: {}",
                self.program,
                output.status.code().unwrap_or(-1),
                tail(stderr.trim(), STDERR_TAIL_CHARS)
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        match serde_json::from_str::<ToolResponse>(stdout.trim()) {
            Ok(resp) => Ok(resp),
            Err(e) => Ok(ToolResponse::error(format!(
                "{} returned an unreadable response: {}",
                self.program, e
            ))),
        }
    }
}

fn tail(s: &str, max_chars: usize) -> &str {
    let count = s.chars().count();
    if count <= max_chars {
        return s;
    }
    let skip = count - max_chars;
    let start = s.char_indices().nth(skip).map(|(i, _)| i).unwrap_or(0);
    &s[start..]
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use evidex_core::tool::ParamValue;

    fn sh(script: &str, timeout_secs: Option<u64>) -> CommandTool {
        CommandTool::new(
            "aws_export_data",
            "sh",
            vec!["-c".to_string(), script.to_string()],
            timeout_secs,
        )
    }

    fn params() -> ParamMap {
        let mut p = ParamMap::new();
        p.insert("account".into(), ParamValue::from("123456789012"));
        p
    }

    #[tokio::test]
    async fn test_params_on_stdin_response_on_stdout() {
        // Echo stdin back inside a success response.
        let tool = sh(
            r#"read -r body; printf '{"status":"success","result":{"echo":%s}}' "$body""#,
            None,
        );
        let resp = tool.invoke(&params()).await.unwrap();
        assert!(resp.is_success());
        assert_eq!(resp.result.unwrap()["echo"]["account"], "123456789012");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_error_response() {
        let resp = sh("echo 'no credentials' >&2; exit 3", None)
            .invoke(&params())
            .await
            .unwrap();
        assert_eq!(resp.status, "error");
        let err = resp.error.unwrap();
        assert!(err.contains("exited with 3"));
        assert!(err.contains("no credentials"));
    }

    #[tokio::test]
    async fn test_garbage_stdout_is_error_response() {
        let resp = sh("echo hello", None).invoke(&params()).await.unwrap();
        assert_eq!(resp.status, "error");
        assert!(resp.error.unwrap().contains("unreadable response"));
    }

    #[tokio::test]
    async fn test_timeout() {
        let resp = sh("sleep 5", Some(1)).invoke(&params()).await.unwrap();
        assert_eq!(resp.status, "error");
        assert!(resp.error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_missing_program_is_err() {
        let tool = CommandTool::new("x", "evidex-no-such-collector", Vec::new(), None);
        assert!(tool.invoke(&params()).await.is_err());
    }

    #[test]
    fn test_tail_keeps_the_end() {
        assert_eq!(tail("abcdef", 3), "def");
        assert_eq!(tail("ab", 3), "ab");
    }
}
