use std::path::Path;
use std::sync::Arc;

use evidex_core::analyzer::{EvidenceAnalyzer, EvidenceSource, EvidenceType, TextExtractor};
use evidex_core::config::{
    AnalyzerConfig, AppConfig, ConcurrencyConfig, DistributedConfig, OcrConfig, ToolKind,
};
use evidex_core::executor::{ConcurrencyStrategy, DistributedExecutor, ParallelExecutor};
use evidex_core::tool::{FanOutToolExecutor, Tool, ToolExecutor, ToolRegistry};

use crate::executor::{AdaptiveConcurrency, FixedConcurrency};
use crate::ocr::CommandTextExtractor;
use crate::source::LocalEvidenceSource;
use crate::tools::{CommandTool, ManifestTool};

/// Registry with every configured tool. The three tools the analyzer
/// proposes fall back to manifest writers when not configured, so a fresh
/// install can replay in dry-run mode.
pub fn build_tool_registry(cfg: &AppConfig) -> ToolRegistry {
    let evidence_dir = cfg.storage.resolved().evidence_dir;
    let mut registry = ToolRegistry::new();

    for tool_cfg in &cfg.tools {
        let name = tool_cfg.name.clone();
        match &tool_cfg.kind {
            ToolKind::Command {
                program,
                args,
                timeout_secs,
            } => {
                let (program, args, timeout_secs) = (program.clone(), args.clone(), *timeout_secs);
                let tool_name = name.clone();
                registry.register(name, move || {
                    Ok(Arc::new(CommandTool::new(
                        tool_name.clone(),
                        program.clone(),
                        args.clone(),
                        timeout_secs,
                    )) as Arc<dyn Tool>)
                });
            }
            ToolKind::Manifest => {
                registry.register_tool(Arc::new(ManifestTool::new(name, evidence_dir.clone())));
            }
        }
    }

    let defaults = [
        EvidenceType::Screenshot,
        EvidenceType::Export,
        EvidenceType::Document,
    ];
    for name in defaults.iter().filter_map(EvidenceType::default_tool) {
        if !registry.contains(name) {
            tracing::debug!(tool = %name, "no tool configured, using manifest writer");
            registry.register_tool(Arc::new(ManifestTool::new(name, evidence_dir.clone())));
        }
    }
    registry
}

pub fn build_concurrency_strategy(cfg: &ConcurrencyConfig) -> Arc<dyn ConcurrencyStrategy> {
    match cfg.strategy.as_str() {
        "adaptive" => Arc::new(AdaptiveConcurrency::new(cfg.clone())),
        "fixed" => Arc::new(FixedConcurrency::new(cfg.base_concurrency)),
        other => {
            tracing::warn!(strategy = %other, "unknown concurrency strategy, using fixed");
            Arc::new(FixedConcurrency::new(cfg.base_concurrency))
        }
    }
}

pub fn build_parallel_executor(cfg: &ConcurrencyConfig) -> Arc<ParallelExecutor> {
    Arc::new(ParallelExecutor::with_strategy(
        cfg.base_concurrency,
        build_concurrency_strategy(cfg),
    ))
}

/// Worker pool from `[executor.distributed]`. The pool is not started; call
/// `start` from inside the runtime that will drive it.
pub fn build_distributed_executor(cfg: &DistributedConfig) -> Arc<DistributedExecutor> {
    tracing::debug!(
        local = cfg.local_workers,
        remote = cfg.remote_workers.len(),
        "building distributed executor"
    );
    Arc::new(DistributedExecutor::new(cfg.clone()))
}

/// The executor the replayer talks to: the registry, wrapped for fan-out
/// when any tool asks for it.
pub fn build_tool_executor(cfg: &AppConfig) -> Arc<dyn ToolExecutor> {
    let registry: Arc<dyn ToolExecutor> = Arc::new(build_tool_registry(cfg));
    let fan_out: Vec<String> = cfg
        .tools
        .iter()
        .filter(|t| t.fan_out)
        .map(|t| t.name.clone())
        .collect();
    if fan_out.is_empty() {
        return registry;
    }

    let parallel = build_parallel_executor(&cfg.executor.parallel);
    Arc::new(FanOutToolExecutor::new(registry, parallel).restrict_to(fan_out))
}

pub fn build_evidence_source(root: &Path) -> Box<dyn EvidenceSource> {
    Box::new(LocalEvidenceSource::new(root.to_string_lossy()))
}

pub fn build_text_extractor(cfg: &OcrConfig) -> Option<Arc<dyn TextExtractor>> {
    if !cfg.enabled || cfg.command.trim().is_empty() {
        return None;
    }
    Some(Arc::new(CommandTextExtractor::from_config(cfg)))
}

pub fn build_analyzer(cfg: &AnalyzerConfig) -> EvidenceAnalyzer {
    let analyzer = EvidenceAnalyzer::from_config(cfg);
    match build_text_extractor(&cfg.ocr) {
        Some(extractor) => analyzer.with_extractor(extractor),
        None => analyzer,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evidex_core::config::{StorageConfig, ToolConfig};
    use evidex_core::executor::distributed::WorkerKind;
    use evidex_core::tool::ParamMap;

    fn config(dir: &Path, tools: Vec<ToolConfig>) -> AppConfig {
        AppConfig {
            storage: StorageConfig {
                data_dir: Some(dir.to_string_lossy().to_string()),
                ..Default::default()
            },
            tools,
            ..Default::default()
        }
    }

    #[test]
    fn test_default_tools_fall_back_to_manifests() {
        let dir = tempfile::tempdir().unwrap();
        let registry = build_tool_registry(&config(
            dir.path(),
            vec![ToolConfig {
                name: "aws_export_data".into(),
                kind: ToolKind::Command {
                    program: "collect-export".into(),
                    args: Vec::new(),
                    timeout_secs: None,
                },
                fan_out: true,
            }],
        ));
        assert_eq!(
            registry.names(),
            vec!["aws_console_screenshot", "aws_export_data", "collect_document"]
        );
        // Command tools are built lazily.
        assert!(!registry.is_loaded("aws_export_data"));
    }

    #[tokio::test]
    async fn test_tool_executor_writes_manifest_under_evidence_dir() {
        let dir = tempfile::tempdir().unwrap();
        let executor = build_tool_executor(&config(dir.path(), Vec::new()));
        let resp = executor
            .execute_tool("collect_document", &ParamMap::new())
            .await
            .unwrap();
        let path = resp.evidence_path().unwrap();
        assert!(path.starts_with(&*dir.path().join("evidence").to_string_lossy()));
    }

    #[test]
    fn test_strategy_selection() {
        let mut cfg = ConcurrencyConfig::default();
        assert_eq!(build_concurrency_strategy(&cfg).name(), "fixed");
        cfg.strategy = "adaptive".into();
        assert_eq!(build_concurrency_strategy(&cfg).name(), "adaptive");
        cfg.strategy = "bogus".into();
        assert_eq!(build_concurrency_strategy(&cfg).name(), "fixed");
    }

    #[test]
    fn test_distributed_executor_follows_config() {
        let cfg = DistributedConfig {
            local_workers: 3,
            remote_workers: vec!["collector-eu.internal:7000".into()],
            ..Default::default()
        };
        let executor = build_distributed_executor(&cfg);
        let workers = executor.workers();
        assert_eq!(workers.len(), 4);
        assert_eq!(
            workers
                .iter()
                .filter(|w| w.kind == WorkerKind::Local)
                .count(),
            3
        );
        assert_eq!(executor.stats().pending, 0);
    }

    #[test]
    fn test_ocr_is_opt_in() {
        let mut ocr = OcrConfig::default();
        assert!(build_text_extractor(&ocr).is_none());
        ocr.enabled = true;
        assert_eq!(build_text_extractor(&ocr).unwrap().name(), "command");
    }
}
