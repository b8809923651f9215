// 标准输出：GUI 子系统进程默认没有控制台

use tracing::debug;

use windows::Win32::System::Console::{AttachConsole, GetStdHandle, ATTACH_PARENT_PROCESS, STD_OUTPUT_HANDLE};

fn has_stdout() -> bool {
    match unsafe { GetStdHandle(STD_OUTPUT_HANDLE) } {
        Ok(handle) => !handle.is_invalid(),
        Err(_) => false,
    }
}

/// 输出被重定向时直接使用；否则挂到父进程的控制台上
pub fn ensure_output() -> bool {
    if has_stdout() {
        return true;
    }
    if let Err(e) = unsafe { AttachConsole(ATTACH_PARENT_PROCESS) } {
        debug!("AttachConsole failed: {}", e);
        return false;
    }
    has_stdout()
}
