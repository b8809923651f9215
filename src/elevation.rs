// 免 UAC 提示的提权启动
//
// 1. 以 `/e` 运行本程序：触发预先注册的计划任务，任务以 SYSTEM 身份用 `/s` 再次运行本程序。
// 2. `/s` 进程找到当前交互会话，取用户的（提升后的）令牌，在用户桌面上启动目标。
// 3. 任务不存在、被禁用或当前会话没有权限时，直接以普通权限启动目标。

use std::io;
use tracing::{debug, info, warn};

use crate::config::ElevationConfig;
use crate::error::{ElevationError, SessionLaunchError, TaskError};

/// 计划任务服务
pub trait TaskTrigger {
    /// 以 `argument` 作为唯一参数运行 `folder\task`
    fn run_task(&self, folder: &str, task: &str, argument: &str) -> Result<(), TaskError>;
}

/// 普通权限启动
pub trait DirectLauncher {
    /// 启动 `program`，`arguments` 原样拼接到命令行；返回进程 ID
    fn launch_direct(&self, program: &str, arguments: &str) -> io::Result<u32>;

    /// 允许新进程把自己的窗口设为前台
    fn allow_foreground(&self, pid: u32) -> io::Result<()>;
}

/// 以哪个用户的身份启动
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionUser {
    /// 当前活动控制台会话的登录用户
    ActiveConsole,
}

/// 在用户的交互会话中以其令牌启动进程（平台相关）
pub trait SessionLauncher {
    fn launch_in_session_as(
        &self,
        user: SessionUser,
        elevated: bool,
        command_line: &str,
    ) -> Result<u32, SessionLaunchError>;
}

/// 目标是如何被启动的
#[derive(Debug)]
pub enum StartMode {
    Elevated,
    Unprivileged { pid: u32, reason: TaskError },
}

impl StartMode {
    /// `/e` 的退出码：0 表示提权成功，否则是计划任务的失败原因
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Elevated => 0,
            Self::Unprivileged { reason, .. } => reason.code(),
        }
    }
}

/// 从计划任务界面手动运行任务时传入的占位参数
const TASK_UI_PLACEHOLDER: &str = "$(Arg0)";

/// 触发提权计划任务，不重试
pub fn run_elevated<T: TaskTrigger>(
    trigger: &T,
    config: &ElevationConfig,
    command_line: &str,
) -> Result<(), TaskError> {
    let task = config.task_name();
    debug!("Running scheduled task {}\\{}", config.task_folder, task);
    trigger.run_task(&config.task_folder, task, command_line)
}

/// 提权启动目标；失败时退回普通启动
pub fn start_target<H>(
    host: &H,
    config: &ElevationConfig,
    command_line: &str,
) -> Result<StartMode, ElevationError>
where
    H: TaskTrigger + DirectLauncher,
{
    let reason = match run_elevated(host, config, command_line) {
        Ok(()) => {
            info!("✓ Elevated start requested through scheduled task");
            return Ok(StartMode::Elevated);
        }
        Err(reason) => reason,
    };

    warn!("Elevated start failed ({}), starting target directly", reason);

    let arguments = target_arguments(config, command_line);
    match host.launch_direct(&config.target_exe, &arguments) {
        Ok(pid) => {
            info!("✓ Target started without elevation (PID: {})", pid);
            if let Err(e) = host.allow_foreground(pid) {
                debug!("AllowSetForegroundWindow({}) failed: {}", pid, e);
            }
            Ok(StartMode::Unprivileged { pid, reason })
        }
        Err(source) => Err(ElevationError { task: reason, source }),
    }
}

/// 计划任务中的 SYSTEM 进程：在当前交互会话里以提升后的用户令牌启动目标
pub fn launch_from_task<S: SessionLauncher>(
    launcher: &S,
    config: &ElevationConfig,
    command_line: &str,
) -> Result<u32, SessionLaunchError> {
    let full = session_command_line(config, command_line);
    info!("🚀 Launching target in user session: {}", full);
    launcher.launch_in_session_as(SessionUser::ActiveConsole, true, &full)
}

/// 目标的参数：禁止再次提权的标志 + 透传的命令行
pub fn target_arguments(config: &ElevationConfig, passthrough: &str) -> String {
    if passthrough.is_empty() || passthrough == TASK_UI_PLACEHOLDER {
        config.no_elevate_flag.clone()
    } else {
        format!("{} {}", config.no_elevate_flag, passthrough)
    }
}

/// 完整命令行（程序路径含空白时加引号）
pub fn session_command_line(config: &ElevationConfig, passthrough: &str) -> String {
    let program = if config.target_exe.contains(char::is_whitespace) {
        format!("\"{}\"", config.target_exe)
    } else {
        config.target_exe.clone()
    };
    format!("{} {}", program, target_arguments(config, passthrough))
}
