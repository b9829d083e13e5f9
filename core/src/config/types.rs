use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub analyzer: AnalyzerConfig,

    #[serde(default)]
    pub executor: ExecutorConfig,

    /// Tools made available to the replayer through the registry.
    #[serde(default)]
    pub tools: Vec<ToolConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_logging_console")]
    pub console: bool,

    /// If true, log to a file under `directory` (or OS temp dir if unset).
    #[serde(default = "default_logging_file")]
    pub file: bool,

    /// EnvFilter string, e.g. "info" or "evidex_core=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    /// Optional directory for log files. If empty or unset, uses OS temp dir.
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_logging_enabled() -> bool {
    true
}

fn default_logging_console() -> bool {
    true
}

fn default_logging_file() -> bool {
    false
}

fn default_logging_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            console: default_logging_console(),
            file: default_logging_file(),
            level: default_logging_level(),
            directory: None,
        }
    }
}

/// Where playbooks, replay reports and collected evidence live.
///
/// Unset directories are derived from `data_dir` by [`StorageConfig::resolved`].
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub data_dir: Option<String>,
    #[serde(default)]
    pub playbooks_dir: Option<String>,
    #[serde(default)]
    pub reports_dir: Option<String>,
    #[serde(default)]
    pub evidence_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    #[serde(default = "default_region")]
    pub default_region: String,

    #[serde(default)]
    pub ocr: OcrConfig,
}

pub fn default_region() -> String {
    "us-east-1".to_string()
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            default_region: default_region(),
            ocr: OcrConfig::default(),
        }
    }
}

/// External OCR command, run as `<command> <image> <args...>`. The
/// recognized text is read from stdout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_ocr_command")]
    pub command: String,
    #[serde(default = "default_ocr_args")]
    pub args: Vec<String>,
}

fn default_ocr_command() -> String {
    "tesseract".to_string()
}

fn default_ocr_args() -> Vec<String> {
    vec!["stdout".to_string()]
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            command: default_ocr_command(),
            args: default_ocr_args(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExecutorConfig {
    #[serde(default)]
    pub parallel: ConcurrencyConfig,

    #[serde(default)]
    pub distributed: DistributedConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    /// "fixed" or "adaptive".
    #[serde(default = "default_concurrency_strategy")]
    pub strategy: String,
    #[serde(default = "default_min_concurrency")]
    pub min_concurrency: usize,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_base_concurrency")]
    pub base_concurrency: usize,
    #[serde(default = "default_cpu_threshold_low")]
    pub cpu_threshold_low: f32,
    #[serde(default = "default_cpu_threshold_high")]
    pub cpu_threshold_high: f32,
    /// Memory usage (percent) at which the adaptive strategy drops to
    /// `min_concurrency`.
    #[serde(default = "default_memory_threshold_high")]
    pub memory_threshold_high: f32,
}

fn default_concurrency_strategy() -> String {
    "fixed".to_string()
}

fn default_min_concurrency() -> usize {
    1
}

fn default_max_concurrency() -> usize {
    16
}

fn default_base_concurrency() -> usize {
    4
}

fn default_cpu_threshold_low() -> f32 {
    50.0
}

fn default_cpu_threshold_high() -> f32 {
    80.0
}

fn default_memory_threshold_high() -> f32 {
    85.0
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            strategy: default_concurrency_strategy(),
            min_concurrency: default_min_concurrency(),
            max_concurrency: default_max_concurrency(),
            base_concurrency: default_base_concurrency(),
            cpu_threshold_low: default_cpu_threshold_low(),
            cpu_threshold_high: default_cpu_threshold_high(),
            memory_threshold_high: default_memory_threshold_high(),
        }
    }
}

/// Job pool settings for library callers that submit work and collect it
/// later. Replay runs do not go through this pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributedConfig {
    #[serde(default = "default_local_workers")]
    pub local_workers: usize,

    /// Named remote endpoints. Dispatch to them is not implemented; they only
    /// take part in health tracking.
    #[serde(default)]
    pub remote_workers: Vec<String>,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Per-task timeout in seconds; 0 disables timeout detection.
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,

    #[serde(default = "default_heartbeat_timeout_secs")]
    pub heartbeat_timeout_secs: u64,

    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

fn default_local_workers() -> usize {
    4
}

fn default_max_retries() -> u32 {
    3
}

fn default_task_timeout_secs() -> u64 {
    300
}

fn default_heartbeat_timeout_secs() -> u64 {
    30
}

fn default_tick_ms() -> u64 {
    1000
}

impl Default for DistributedConfig {
    fn default() -> Self {
        Self {
            local_workers: default_local_workers(),
            remote_workers: Vec::new(),
            max_retries: default_max_retries(),
            task_timeout_secs: default_task_timeout_secs(),
            heartbeat_timeout_secs: default_heartbeat_timeout_secs(),
            tick_ms: default_tick_ms(),
        }
    }
}

/// A tool exposed to playbooks under `name`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    pub name: String,

    #[serde(flatten)]
    pub kind: ToolKind,

    /// Expand comma/space separated account and region lists and run each
    /// combination through the parallel executor.
    #[serde(default)]
    pub fan_out: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolKind {
    /// Runs `program` with params as JSON on stdin; stdout must be a JSON
    /// tool response.
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        timeout_secs: Option<u64>,
    },
    /// Writes a JSON manifest of the requested collection into the evidence
    /// directory. Used for dry runs.
    Manifest,
}
