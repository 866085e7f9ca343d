use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagingConfig {
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
    #[serde(default)]
    pub enable_selection: bool,
}

fn default_page_size() -> usize {
    10
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            enable_selection: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    #[serde(default = "default_distinct_limit")]
    pub distinct_sample_limit: usize,
    #[serde(default = "default_multi_select_max")]
    pub multi_select_max: usize,
}

fn default_distinct_limit() -> usize {
    50
}
fn default_multi_select_max() -> usize {
    20
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            distinct_sample_limit: default_distinct_limit(),
            multi_select_max: default_multi_select_max(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// "reject" surfaces malformed filters as errors; "drop" skips them
    /// silently the way the lenient mode does.
    #[serde(default = "default_on_invalid")]
    pub on_invalid: String,
    #[serde(default = "default_join")]
    pub join_operator: String,
}

fn default_on_invalid() -> String {
    "reject".into()
}
fn default_join() -> String {
    "and".into()
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            on_invalid: default_on_invalid(),
            join_operator: default_join(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_compression")]
    pub compression: String,
    #[serde(default = "default_suffix")]
    pub file_suffix: String,
}

fn default_compression() -> String {
    "zstd".into()
}
fn default_suffix() -> String {
    "_export.parquet".into()
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            compression: default_compression(),
            file_suffix: default_suffix(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub paging: PagingConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

impl Config {
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("parquet-grid")
            .join("config.toml")
    }

    pub fn load() -> crate::Result<Self> {
        let path = if let Ok(env_path) = std::env::var("PARQUET_GRID_CONFIG") {
            PathBuf::from(env_path) // $PARQUET_GRID_CONFIG overrides default config path
        } else {
            Self::config_path()
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        let cfg: Self =
            toml::from_str(&content).map_err(|e| crate::GridError::Other(e.to_string()))?;
        Ok(cfg)
    }

    pub fn save(&self) -> crate::Result<()> {
        let path = Self::config_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::GridError::Other(e.to_string()))?;
        std::fs::write(&path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_limits() {
        let cfg = Config::default();
        assert_eq!(cfg.paging.default_page_size, 10);
        assert_eq!(cfg.probe.distinct_sample_limit, 50);
        assert_eq!(cfg.probe.multi_select_max, 20);
        assert_eq!(cfg.export.compression, "zstd");
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: Config = toml::from_str("[paging]\ndefault_page_size = 25\n").unwrap();
        assert_eq!(cfg.paging.default_page_size, 25);
        assert_eq!(cfg.probe.distinct_sample_limit, 50);
        assert_eq!(cfg.filter.on_invalid, "reject");
    }
}
