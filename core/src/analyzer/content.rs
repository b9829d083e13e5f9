//! Content heuristics: OCR keyword lookup and tabular column sniffing.

/// Ordered keyword sets. The first set with any hit decides the service.
const SERVICE_KEYWORDS: &[(&str, &[&str])] = &[
    ("rds", &["rds", "db instance", "aurora", "database"]),
    ("cloudtrail", &["cloudtrail", "event history", "trail"]),
    ("iam", &["iam", "mfa", "access key", "identity and access"]),
    ("guardduty", &["guardduty", "threat detection"]),
    ("backup", &["aws backup", "backup plan", "backup vault"]),
    ("kms", &["kms", "key management", "customer managed key"]),
    ("cloudwatch", &["cloudwatch", "alarm", "log group"]),
    ("s3", &["s3", "bucket"]),
    ("ec2", &["ec2", "security group", "instance"]),
    ("incident", &["incident", "postmortem", "pagerduty"]),
];

/// Column rules: every needle must appear in some column name.
const COLUMN_RULES: &[(&[&str], &str, &str)] = &[
    (&["mfa", "user"], "iam_users", "iam"),
    (&["access_key", "user"], "iam_access_keys", "iam"),
    (&["policy", "role"], "iam_roles", "iam"),
    (&["db_instance"], "rds_instances", "rds"),
    (&["engine", "instance"], "rds_instances", "rds"),
    (&["snapshot"], "rds_snapshots", "rds"),
    (&["backup", "retention"], "backup_policies", "backup"),
    (&["bucket", "encryption"], "s3_buckets", "s3"),
    (&["trail", "logging"], "cloudtrail_trails", "cloudtrail"),
    (&["finding", "severity"], "security_findings", "securityhub"),
    (&["instance_id"], "ec2_instances", "ec2"),
    (&["incident"], "incidents", "incident"),
    (&["ticket", "approv"], "change_tickets", "change_management"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordHit {
    pub service: &'static str,
    pub keywords: Vec<String>,
}

pub fn classify_text(text: &str) -> Option<KeywordHit> {
    let lower = text.to_lowercase();
    SERVICE_KEYWORDS.iter().find_map(|(service, keywords)| {
        let hits: Vec<String> = keywords
            .iter()
            .filter(|k| lower.contains(*k))
            .map(|k| k.to_string())
            .collect();
        (!hits.is_empty()).then_some(KeywordHit {
            service,
            keywords: hits,
        })
    })
}

/// `(data_type, service)` for a set of column names.
pub fn classify_columns(columns: &[String]) -> Option<(&'static str, &'static str)> {
    let normalized: Vec<String> = columns.iter().map(|c| normalize_column(c)).collect();
    COLUMN_RULES.iter().find_map(|(needles, data_type, service)| {
        needles
            .iter()
            .all(|needle| normalized.iter().any(|c| c.contains(needle)))
            .then_some((*data_type, *service))
    })
}

fn normalize_column(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .replace([' ', '-'], "_")
}

/// Column names from the header record of CSV data. Quoting and escaped
/// quotes follow RFC 4180; a leading UTF-8 BOM is dropped.
pub fn parse_csv_header(data: &[u8]) -> Result<Vec<String>, csv::Error> {
    let data = data.strip_prefix(b"\xef\xbb\xbf").unwrap_or(data);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(data);
    Ok(reader
        .headers()?
        .iter()
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect())
}

/// First `max` characters of `text` with whitespace collapsed.
pub fn excerpt(text: &str, max: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(max).collect()
}
