//! Prior-year evidence analysis: filename templates, OCR keywords and
//! tabular column heuristics.

mod analyze;
mod content;
mod patterns;
mod source;
mod types;

pub use analyze::{build_collection_plan, EvidenceAnalyzer, RfiAnalysis};
pub(crate) use analyze::metadata_str;
pub use content::{classify_columns, classify_text, parse_csv_header};
pub use patterns::{find_account, find_region, infer_type, match_filename, FilenameMatch};
pub use source::{EvidenceSource, TextExtractor};
pub use types::{
    CollectionPlan, ContentAnalysis, EvidenceAnalysis, EvidenceEntry, EvidenceFile, EvidenceType,
    FolderHandle, PlanItem, ReplicationInstruction,
};
