use std::path::{Path, PathBuf};

use super::types::{AppConfig, StorageConfig};

/// Get the default evidex data directory: ~/.evidex
pub fn get_evidex_data_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(PathBuf::from(home).join(".evidex"))
}

pub fn load_default() -> anyhow::Result<AppConfig> {
    // Priority 1: ~/.evidex/config.toml (highest)
    let evidex_dir = get_evidex_data_dir()?;
    let evidex_config = evidex_dir.join("config.toml");

    // Priority 2: ./config.toml (current directory)
    let local_config = Path::new("config.toml");

    let mut cfg: AppConfig = if evidex_config.exists() {
        load_from_path(&evidex_config)?
    } else if local_config.exists() {
        load_from_path(local_config)?
    } else {
        AppConfig::default()
    };

    if cfg.storage.data_dir.is_none() {
        cfg.storage.data_dir = Some(evidex_dir.to_string_lossy().to_string());
    }

    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Load an explicitly named config file, then apply the same data-dir
/// default and environment overrides as [`load_default`].
pub fn load_explicit(path: &Path) -> anyhow::Result<AppConfig> {
    let mut cfg = load_from_path(path)?;
    if cfg.storage.data_dir.is_none() {
        cfg.storage.data_dir = Some(get_evidex_data_dir()?.to_string_lossy().to_string());
    }
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

pub fn load_from_path(path: &Path) -> anyhow::Result<AppConfig> {
    let s = std::fs::read_to_string(path)?;
    let cfg = toml::from_str::<AppConfig>(&s)?;
    Ok(cfg)
}

// Environment variable overrides (Priority 0: highest)
fn apply_env_overrides(cfg: &mut AppConfig) {
    if let Ok(v) = std::env::var("EVIDEX_DATA_DIR") {
        if !v.trim().is_empty() {
            cfg.storage.data_dir = Some(v);
        }
    }
    if let Ok(v) = std::env::var("EVIDEX_LOG_LEVEL") {
        if !v.trim().is_empty() {
            cfg.logging.level = v;
        }
    }
    if let Ok(v) = std::env::var("EVIDEX_DEFAULT_REGION") {
        if !v.trim().is_empty() {
            cfg.analyzer.default_region = v;
        }
    }
}

/// Storage directories with defaults filled in and `~` expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    pub playbooks_dir: PathBuf,
    pub reports_dir: PathBuf,
    pub evidence_dir: PathBuf,
}

impl StorageConfig {
    pub fn resolved(&self) -> StoragePaths {
        let data_dir = self
            .data_dir
            .as_deref()
            .map(expand)
            .unwrap_or_else(|| PathBuf::from(".evidex"));

        let pick = |explicit: &Option<String>, sub: &str| {
            explicit
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(expand)
                .unwrap_or_else(|| data_dir.join(sub))
        };

        StoragePaths {
            playbooks_dir: pick(&self.playbooks_dir, "playbooks"),
            reports_dir: pick(&self.reports_dir, "reports"),
            evidence_dir: pick(&self.evidence_dir, "evidence"),
        }
    }
}

fn expand(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_defaults_derive_from_data_dir() {
        let cfg = StorageConfig {
            data_dir: Some("/srv/evidex".to_string()),
            reports_dir: Some("/var/reports".to_string()),
            ..Default::default()
        };
        let paths = cfg.resolved();
        assert_eq!(paths.playbooks_dir, PathBuf::from("/srv/evidex/playbooks"));
        assert_eq!(paths.reports_dir, PathBuf::from("/var/reports"));
        assert_eq!(paths.evidence_dir, PathBuf::from("/srv/evidex/evidence"));
    }

    #[test]
    fn test_parse_tools_section() {
        let raw = r#"
            [analyzer]
            default_region = "eu-west-1"

            [executor.distributed]
            local_workers = 2
            max_retries = 1

            [[tools]]
            name = "aws_console_screenshot"
            kind = "manifest"

            [[tools]]
            name = "aws_export_data"
            kind = "command"
            program = "collect-export"
            args = ["--json"]
            fan_out = true
        "#;
        let cfg: AppConfig = toml::from_str(raw).unwrap();
        assert_eq!(cfg.analyzer.default_region, "eu-west-1");
        assert_eq!(cfg.executor.distributed.local_workers, 2);
        assert_eq!(cfg.executor.distributed.tick_ms, 1000);
        assert_eq!(cfg.tools.len(), 2);
        assert!(cfg.tools[1].fan_out);
        assert!(matches!(
            cfg.tools[1].kind,
            crate::config::ToolKind::Command { ref program, .. } if program == "collect-export"
        ));
    }
}
