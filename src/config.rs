// ==========================================
// MacroClaw 摄取管线 - 配置层
// ==========================================
// 职责: 数据库路径与归档目录的配置装载
// 来源: YAML 配置文件（常规位置自动探测）+ 内置默认值
// ==========================================

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

// ==========================================
// PipelineConfig - 管线配置
// ==========================================
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// SQLite 存储文件路径
    pub db_path: PathBuf,
    /// 已处理文件的归档目录
    pub archive_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            db_path: default_data_dir().join("macroclaw.db"),
            archive_dir: default_data_dir().join("archive"),
        }
    }
}

impl PipelineConfig {
    /// 装载配置
    ///
    /// explicit 为 None 时依次探测常规位置，均不存在则用默认值
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        for candidate in default_config_locations() {
            if candidate.exists() {
                debug!(path = %candidate.display(), "使用探测到的配置文件");
                return Self::from_file(&candidate);
            }
        }

        debug!("未找到配置文件，使用默认配置");
        Ok(Self::default())
    }

    /// 从 YAML 文件装载；允许配置在顶层或嵌套在 macroclaw 键下
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("无法读取配置文件: {}", path.display()))?;
        let value: serde_yaml::Value = serde_yaml::from_str(&text)
            .with_context(|| format!("配置文件不是合法 YAML: {}", path.display()))?;

        let section = value.get("macroclaw").cloned().unwrap_or(value);
        let mut cfg: PipelineConfig = serde_yaml::from_value(section)
            .with_context(|| format!("配置字段非法: {}", path.display()))?;

        cfg.db_path = expand_tilde(&cfg.db_path);
        cfg.archive_dir = expand_tilde(&cfg.archive_dir);
        Ok(cfg)
    }
}

/// 默认数据目录（平台数据目录下的 macroclaw/）
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("macroclaw")
}

/// 配置文件的常规探测位置（按优先级）
fn default_config_locations() -> Vec<PathBuf> {
    let mut out = vec![
        PathBuf::from("config/config.yaml"),
        PathBuf::from("config.yaml"),
    ];
    if let Some(dir) = dirs::config_dir() {
        out.push(dir.join("macroclaw/config.yaml"));
    }
    out
}

/// 展开路径前缀 `~` 为用户主目录
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}
