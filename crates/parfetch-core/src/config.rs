use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::strategy::StrategyKind;

/// Global configuration loaded from `~/.config/parfetch/config.toml`.
/// CLI flags override these values per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParfetchConfig {
    /// Default concurrency strategy: "threaded", "process", or "async".
    #[serde(default)]
    pub strategy: StrategyKind,
    /// Pool size for the threaded/process strategies. When missing, one
    /// worker per available core.
    #[serde(default)]
    pub workers: Option<usize>,
    /// Optional connect timeout in seconds. Absent means no timeout: a hung
    /// connect stalls that one fetch, never the batch bookkeeping.
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,
}

impl Default for ParfetchConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::Cooperative,
            workers: None,
            connect_timeout_secs: None,
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("parfetch")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<ParfetchConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = ParfetchConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: ParfetchConfig = toml::from_str(&data)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = ParfetchConfig::default();
        assert_eq!(cfg.strategy, StrategyKind::Cooperative);
        assert!(cfg.workers.is_none());
        assert!(cfg.connect_timeout_secs.is_none());
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = ParfetchConfig {
            strategy: StrategyKind::ThreadPool,
            workers: Some(8),
            connect_timeout_secs: Some(15),
        };
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: ParfetchConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.strategy, cfg.strategy);
        assert_eq!(parsed.workers, cfg.workers);
        assert_eq!(parsed.connect_timeout_secs, cfg.connect_timeout_secs);
    }

    #[test]
    fn config_toml_missing_fields_use_defaults() {
        let cfg: ParfetchConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.strategy, StrategyKind::Cooperative);
        assert!(cfg.workers.is_none());
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            strategy = "process"
            workers = 2
            connect_timeout_secs = 30
        "#;
        let cfg: ParfetchConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.strategy, StrategyKind::ProcessPool);
        assert_eq!(cfg.workers, Some(2));
        assert_eq!(cfg.connect_timeout_secs, Some(30));
    }

    #[test]
    fn config_toml_rejects_unknown_strategy() {
        let toml = r#"strategy = "fibers""#;
        assert!(toml::from_str::<ParfetchConfig>(toml).is_err());
    }
}
