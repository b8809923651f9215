// 日志初始化
//
// 标准输出用于转发命令输出，日志只写文件（调试构建额外写 stderr）。

use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::utils::paths;

const LOG_FILE_NAME: &str = "cl.log";
const DEFAULT_FILTER: &str = "ilauncher_cl=info";

pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    let file_layer = match paths::get_log_dir() {
        Ok(log_dir) => {
            let file_appender = rolling::daily(&log_dir, LOG_FILE_NAME);
            Some(fmt::layer().with_writer(file_appender).with_ansi(false))
        }
        Err(e) => {
            eprintln!("ilauncher-cl: cannot create log directory: {:#}", e);
            None
        }
    };

    // 非发布构建把诊断信息也写到 stderr；没有日志目录时同样退回 stderr
    let stderr_layer = (cfg!(debug_assertions) || file_layer.is_none())
        .then(|| fmt::layer().with_writer(std::io::stderr).with_ansi(false));

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init();

    if result.is_ok() {
        tracing::info!(
            "========== ilauncher-cl started at {} (pid {}) ==========",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            std::process::id()
        );
    }
}
