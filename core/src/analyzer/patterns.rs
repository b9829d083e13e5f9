//! Filename templates used by prior-year evidence.

use std::sync::OnceLock;

use regex::Regex;

use super::types::EvidenceType;

/// Fields recovered from a filename. Every field is optional; which ones are
/// set depends on the template that matched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilenameMatch {
    pub pattern: &'static str,
    pub product: Option<String>,
    pub source: Option<String>,
    pub service: Option<String>,
    pub account: Option<String>,
    pub resource: Option<String>,
    pub page: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
}

pub const PRODUCT_SERVICE_DESCRIPTION_DATE: &str = "product_service_description_date";
pub const SOURCE_ACCOUNT_SERVICE_RESOURCE_PAGE: &str = "source_account_service_resource_page_timestamp";

static PRODUCT_REGEX: OnceLock<Regex> = OnceLock::new();
static SOURCE_REGEX: OnceLock<Regex> = OnceLock::new();
static REGION_REGEX: OnceLock<Regex> = OnceLock::new();
static ACCOUNT_REGEX: OnceLock<Regex> = OnceLock::new();

fn product_regex() -> &'static Regex {
    PRODUCT_REGEX.get_or_init(|| {
        Regex::new(
            r"^(?P<product>[A-Za-z][A-Za-z0-9]*)_(?P<service>[A-Za-z][A-Za-z0-9-]*)_(?P<description>.+?)_(?P<date>\d{4}-\d{2}-\d{2}|\d{8})$",
        )
        .expect("PRODUCT_REGEX is valid")
    })
}

fn source_regex() -> &'static Regex {
    SOURCE_REGEX.get_or_init(|| {
        Regex::new(
            r"^(?P<source>[A-Za-z]+)_(?P<account>\d{12})_(?P<service>[A-Za-z0-9-]+)_(?P<resource>[A-Za-z0-9.:/-]+)_(?P<page>[A-Za-z0-9-]+)_(?P<timestamp>\d{8}(?:T?\d{4,6})?)$",
        )
        .expect("SOURCE_REGEX is valid")
    })
}

fn region_regex() -> &'static Regex {
    REGION_REGEX.get_or_init(|| {
        Regex::new(
            r"(?:^|[^a-z0-9])((?:us|eu|ap|sa|ca|me|af|il|mx)(?:-gov)?-(?:north|south|east|west|central|northeast|southeast|northwest|southwest)-\d)(?:[^a-z0-9]|$)",
        )
        .expect("REGION_REGEX is valid")
    })
}

fn account_regex() -> &'static Regex {
    ACCOUNT_REGEX.get_or_init(|| Regex::new(r"\b(\d{12})\b").expect("ACCOUNT_REGEX is valid"))
}

fn stem(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    }
}

/// Try each template in order; the first match wins.
pub fn match_filename(name: &str) -> Option<FilenameMatch> {
    let stem = stem(name.trim());

    if let Some(caps) = product_regex().captures(stem) {
        return Some(FilenameMatch {
            pattern: PRODUCT_SERVICE_DESCRIPTION_DATE,
            product: caps.name("product").map(|m| m.as_str().to_string()),
            service: caps.name("service").map(|m| m.as_str().to_ascii_lowercase()),
            description: caps.name("description").map(|m| m.as_str().replace('_', " ")),
            date: caps.name("date").map(|m| m.as_str().to_string()),
            ..Default::default()
        });
    }

    if let Some(caps) = source_regex().captures(stem) {
        return Some(FilenameMatch {
            pattern: SOURCE_ACCOUNT_SERVICE_RESOURCE_PAGE,
            source: caps.name("source").map(|m| m.as_str().to_ascii_lowercase()),
            account: caps.name("account").map(|m| m.as_str().to_string()),
            service: caps.name("service").map(|m| m.as_str().to_ascii_lowercase()),
            resource: caps.name("resource").map(|m| m.as_str().to_string()),
            page: caps.name("page").map(|m| m.as_str().to_string()),
            date: caps.name("timestamp").map(|m| m.as_str().to_string()),
            ..Default::default()
        });
    }

    None
}

/// First AWS region token in `text`, e.g. `eu-west-1`.
pub fn find_region(text: &str) -> Option<String> {
    let lower = text.to_ascii_lowercase();
    region_regex()
        .captures(&lower)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// First 12-digit AWS account id in `text`.
pub fn find_account(text: &str) -> Option<String> {
    account_regex()
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Evidence type from the declared MIME type, else from the extension.
pub fn infer_type(mime_type: Option<&str>, extension: Option<&str>) -> EvidenceType {
    if let Some(kind) = mime_type.and_then(type_from_mime) {
        return kind;
    }
    extension
        .map(type_from_extension)
        .unwrap_or(EvidenceType::Unknown)
}

fn type_from_mime(mime: &str) -> Option<EvidenceType> {
    let mime = mime.trim().to_ascii_lowercase();
    if mime.starts_with("image/") {
        return Some(EvidenceType::Screenshot);
    }
    match mime.as_str() {
        "text/csv"
        | "text/tab-separated-values"
        | "application/json"
        | "application/vnd.ms-excel"
        | "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => {
            Some(EvidenceType::Export)
        }
        "application/pdf"
        | "application/msword"
        | "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        | "application/vnd.openxmlformats-officedocument.presentationml.presentation"
        | "text/plain"
        | "text/markdown" => Some(EvidenceType::Document),
        _ => None,
    }
}

fn type_from_extension(ext: &str) -> EvidenceType {
    match ext {
        "png" | "jpg" | "jpeg" | "gif" | "bmp" | "webp" | "tif" | "tiff" => EvidenceType::Screenshot,
        "csv" | "tsv" | "xlsx" | "xls" | "json" => EvidenceType::Export,
        "pdf" | "doc" | "docx" | "pptx" | "txt" | "md" => EvidenceType::Document,
        _ => EvidenceType::Unknown,
    }
}
