// 配置文件管理

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::utils::paths::get_config_dir;

const DEFAULT_CONFIG_PATH: &str = "cl.json";

/// 启动器配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// 目标的 message-only 控制窗口类名
    pub window_class: String,
    /// 结果管道名前缀，后接线程 ID
    pub pipe_prefix: String,
    /// 结果管道的安全描述符（SDDL）
    pub pipe_sddl: String,
    /// WM_COPYDATA 的 dwData 标记
    pub copydata_tag: usize,
    pub locator: LocatorConfig,
    pub elevation: ElevationConfig,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            window_class: "iLauncher.Ctl.7kQ2vX9pLm4RtZ0wYb8c".to_string(),
            pipe_prefix: r"\\.\pipe\ilauncher-cl-".to_string(),
            // 已认证用户可读写，等同 PipeSecurity 的 ReadWrite
            pipe_sddl: "D:(A;;0x12019b;;;AU)".to_string(),
            copydata_tag: 99,
            locator: LocatorConfig::default(),
            elevation: ElevationConfig::default(),
        }
    }
}

/// 查找目标窗口的重试参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    pub max_attempts: u32,
    pub poll_interval_ms: u64,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1000,
            poll_interval_ms: 15,
        }
    }
}

impl LocatorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// 通过计划任务提权启动目标的参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElevationConfig {
    pub target_exe: String,
    /// 告诉目标不要再自行提权
    pub no_elevate_flag: String,
    pub task_folder: String,
    pub task_name: String,
    /// 开发机上注册的任务名
    pub dev_task_name: String,
    /// 存在该环境变量即视为开发机
    pub dev_marker_env: String,
}

impl Default for ElevationConfig {
    fn default() -> Self {
        Self {
            target_exe: "iLauncher.exe".to_string(),
            no_elevate_flag: "/n".to_string(),
            task_folder: "iLauncher".to_string(),
            task_name: "iLauncher".to_string(),
            dev_task_name: "_iLauncher".to_string(),
            dev_marker_env: "ILAUNCHER_DEV_HOST".to_string(),
        }
    }
}

impl ElevationConfig {
    /// 根据开发机标记选择计划任务名
    pub fn task_name_with<F>(&self, lookup: F) -> &str
    where
        F: Fn(&str) -> Option<String>,
    {
        match lookup(&self.dev_marker_env) {
            Some(value) if !value.is_empty() => &self.dev_task_name,
            _ => &self.task_name,
        }
    }

    pub fn task_name(&self) -> &str {
        self.task_name_with(|key| std::env::var(key).ok())
    }
}

impl DispatchConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }

    /// 用环境变量覆盖配置项，`lookup` 便于测试注入
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("ILAUNCHER_CL_WINDOW_CLASS").filter(|v| !v.is_empty()) {
            self.window_class = v;
        }
        if let Some(v) = lookup("ILAUNCHER_CL_PIPE_PREFIX").filter(|v| !v.is_empty()) {
            self.pipe_prefix = v;
        }
        if let Some(v) = lookup("ILAUNCHER_CL_TARGET_EXE").filter(|v| !v.is_empty()) {
            self.elevation.target_exe = v;
        }
        if let Some(v) = lookup("ILAUNCHER_CL_MAX_ATTEMPTS") {
            match v.parse::<u32>() {
                Ok(n) if n > 0 => self.locator.max_attempts = n,
                _ => tracing::warn!("Ignoring invalid ILAUNCHER_CL_MAX_ATTEMPTS={:?}", v),
            }
        }
        if let Some(v) = lookup("ILAUNCHER_CL_POLL_MS") {
            match v.parse::<u64>() {
                Ok(n) if n > 0 => self.locator.poll_interval_ms = n,
                _ => tracing::warn!("Ignoring invalid ILAUNCHER_CL_POLL_MS={:?}", v),
            }
        }
    }
}

/// 加载配置：配置文件（如存在）+ 环境变量覆盖
pub fn load_config() -> Result<DispatchConfig> {
    let config_path = get_config_dir()?.join(DEFAULT_CONFIG_PATH);

    let mut config = if config_path.exists() {
        DispatchConfig::load_from_file(&config_path)?
    } else {
        DispatchConfig::default()
    };

    config.apply_overrides(|key| std::env::var(key).ok());
    Ok(config)
}
