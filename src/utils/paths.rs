// 统一的路径管理模块

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "iLauncher";

/// 获取应用数据根目录 (AppData\Local\iLauncher)
pub fn get_app_data_dir() -> Result<PathBuf> {
    let local_appdata =
        dirs::data_local_dir().context("Failed to resolve local app data directory")?;

    ensure_dir(local_appdata.join(APP_DIR_NAME), "app data")
}

/// 获取日志文件目录 (AppData\Local\iLauncher\logs)
pub fn get_log_dir() -> Result<PathBuf> {
    ensure_dir(get_app_data_dir()?.join("logs"), "log")
}

/// 获取配置目录 (AppData\Local\iLauncher\config)
pub fn get_config_dir() -> Result<PathBuf> {
    ensure_dir(get_app_data_dir()?.join("config"), "config")
}

fn ensure_dir(dir: PathBuf, what: &str) -> Result<PathBuf> {
    if !dir.exists() {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {} directory {}", what, display(&dir)))?;
    }

    Ok(dir)
}

fn display(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
