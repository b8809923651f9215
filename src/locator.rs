// 目标定位：查找目标的 message-only 控制窗口，必要时启动目标

use std::fmt::Debug;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::LocatorConfig;
use crate::error::DispatchError;

/// 目标的控制窗口所在的"表面"
pub trait ControlSurface {
    type Window: Copy + Debug;

    /// 在 message-only 顶层窗口中按类名查找
    fn find_window(&self, class_name: &str) -> Option<Self::Window>;

    /// 两次查找之间的等待
    fn pause(&self, interval: Duration) {
        std::thread::sleep(interval);
    }
}

/// 查找控制窗口；第一次找不到时调用 `start` 启动目标，然后按固定间隔继续轮询
///
/// `start` 返回 `false` 表示提权启动和普通启动都失败，此时立即放弃。
pub fn find_or_start<S, F>(
    surface: &S,
    config: &LocatorConfig,
    class_name: &str,
    start: F,
) -> Result<S::Window, DispatchError>
where
    S: ControlSurface,
    F: FnOnce() -> bool,
{
    let mut start = Some(start);
    // 配置为 0 时至少查找一次
    let max_attempts = config.max_attempts.max(1);

    for attempt in 0..max_attempts {
        if let Some(window) = surface.find_window(class_name) {
            if attempt > 0 {
                info!("✓ Target control window appeared after {} attempts", attempt + 1);
            }
            return Ok(window);
        }

        if let Some(start) = start.take() {
            info!("🚀 Target is not running, starting it...");
            if !start() {
                warn!("❌ Could not start the target application");
                return Err(DispatchError::TargetUnavailable);
            }
        }

        debug!("Control window not found (attempt #{})", attempt + 1);
        surface.pause(config.poll_interval());
    }

    warn!(
        "❌ Target control window did not appear after {} attempts",
        max_attempts
    );
    Err(DispatchError::TargetUnavailable)
}
