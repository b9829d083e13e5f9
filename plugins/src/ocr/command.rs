use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use evidex_core::analyzer::{EvidenceFile, TextExtractor};
use evidex_core::config::OcrConfig;
use evidex_core::error::AnalyzerError;

/// Runs an external OCR program (tesseract by default) as
/// `<command> <path> <args...>` and takes stdout as the recognized text.
pub struct CommandTextExtractor {
    command: String,
    args: Vec<String>,
}

impl CommandTextExtractor {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    pub fn from_config(cfg: &OcrConfig) -> Self {
        Self::new(cfg.command.clone(), cfg.args.clone())
    }
}

#[async_trait]
impl TextExtractor for CommandTextExtractor {
    fn name(&self) -> &str {
        "command"
    }

    async fn extract_text(&self, file: &EvidenceFile) -> Result<String, AnalyzerError> {
        let fail = |reason: String| AnalyzerError::Extraction {
            name: file.name.clone(),
            reason,
        };
        let path = file
            .path
            .as_ref()
            .ok_or_else(|| fail("no local copy to read".to_string()))?;

        let output = Command::new(&self.command)
            .arg(path)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| fail(format!("failed to run {}: {}", self.command, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(fail(format!(
                "{} exited with {}: {}",
                self.command,
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        tracing::debug!(file = %file.name, chars = text.len(), "ocr text extracted");
        Ok(text)
    }
}
