use async_trait::async_trait;

use crate::error::AnalyzerError;

use super::types::{EvidenceFile, FolderHandle};

/// Read-only view of wherever prior-year evidence is kept.
#[async_trait]
pub trait EvidenceSource: Send + Sync {
    fn name(&self) -> &str;

    async fn find_rfi_folder(
        &self,
        rfi: &str,
        product: Option<&str>,
    ) -> Result<Option<FolderHandle>, AnalyzerError>;

    async fn list_evidence(&self, folder: &FolderHandle)
        -> Result<Vec<EvidenceFile>, AnalyzerError>;
}

/// Turns an image into text (OCR).
#[async_trait]
pub trait TextExtractor: Send + Sync {
    fn name(&self) -> &str;

    async fn extract_text(&self, file: &EvidenceFile) -> Result<String, AnalyzerError>;
}
