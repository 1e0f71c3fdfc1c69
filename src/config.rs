// src/config.rs - 配置加载，支持文件覆盖

use crate::types::{Color, EcLevel, RenderOptions};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 默认图片边长（像素）
    pub size: u32,
    pub error_correction: EcLevel,
    /// 静区宽度（模块数）
    pub margin: u32,
    pub dark: Color,
    pub light: Color,
    /// 历史记录目录，缺省为 `<data_dir>/airqr`
    pub data_dir: Option<PathBuf>,
    /// 历史记录最大条数
    pub history_limit: usize,
    /// 实时生成的防抖间隔（毫秒）
    pub debounce_ms: u64,
    /// RUST_LOG 未设置时使用的日志级别
    pub log_level: String,
    /// 是否转义 WIFI/vCard 字段中的保留字符
    pub escape_reserved: bool,
}

impl Default for Config {
    fn default() -> Self {
        let render = RenderOptions::default();
        Self {
            size: render.size,
            error_correction: render.error_correction,
            margin: render.margin,
            dark: render.dark,
            light: render.light,
            data_dir: None,
            history_limit: crate::history::MAX_HISTORY_ITEMS,
            debounce_ms: 300,
            log_level: "warn".into(),
            escape_reserved: false,
        }
    }
}

impl Config {
    /// 按优先级查找并加载配置文件
    pub fn load() -> Result<Self> {
        for path in &config_candidates() {
            if path.exists() {
                let text = std::fs::read_to_string(path)?;
                let cfg: Config = toml::from_str(&text)?;
                return Ok(cfg);
            }
        }
        Ok(Config::default())
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            size: self.size,
            error_correction: self.error_correction,
            margin: self.margin,
            dark: self.dark,
            light: self.light,
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// 历史记录所在目录
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("airqr")
        })
    }
}

fn config_candidates() -> Vec<PathBuf> {
    let mut v = vec![];
    // 同目录下的 config.toml
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            v.push(dir.join("config.toml"));
        }
    }
    // ~/.config/airqr/config.toml
    if let Some(home) = dirs::home_dir() {
        v.push(home.join(".config/airqr/config.toml"));
    }
    v
}
