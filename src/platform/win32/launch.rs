// 普通权限启动目标

use std::env;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

use windows::core::{PCWSTR, PWSTR};
use windows::Win32::System::Threading::{
    CreateProcessW, PROCESS_CREATION_FLAGS, PROCESS_INFORMATION, STARTF_FORCEOFFFEEDBACK, STARTUPINFOW,
};
use windows::Win32::UI::WindowsAndMessaging::AllowSetForegroundWindow;

use super::{io_error, HandleGuard};
use crate::utils::wide::to_wide_null;

/// 相对路径按本程序所在目录解析
pub fn beside_current_exe(program: &str) -> String {
    if Path::new(program).is_absolute() {
        return program.to_string();
    }
    match env::current_exe() {
        Ok(exe) => match exe.parent() {
            Some(dir) => dir.join(program).to_string_lossy().into_owned(),
            None => program.to_string(),
        },
        Err(e) => {
            warn!("Failed to get current executable path: {}", e);
            program.to_string()
        }
    }
}

/// 程序路径总是加引号，`arguments` 不经转义直接拼接
fn direct_command_line(program: &str, arguments: &str) -> String {
    if arguments.is_empty() {
        format!("\"{}\"", program)
    } else {
        format!("\"{}\" {}", program, arguments)
    }
}

/// 启动时不显示忙碌光标，定位器轮询期间鼠标保持原样
pub fn launch_direct(program: &str, arguments: &str) -> io::Result<u32> {
    let command_line = direct_command_line(program, arguments);
    debug!("Starting {}", command_line);

    let application = to_wide_null(program);
    let mut cmd = to_wide_null(&command_line);
    let startup = STARTUPINFOW {
        cb: std::mem::size_of::<STARTUPINFOW>() as u32,
        dwFlags: STARTF_FORCEOFFFEEDBACK,
        ..Default::default()
    };
    let mut process = PROCESS_INFORMATION::default();

    unsafe {
        CreateProcessW(
            PCWSTR(application.as_ptr()),
            PWSTR(cmd.as_mut_ptr()),
            None,
            None,
            false,
            PROCESS_CREATION_FLAGS(0),
            None,
            PCWSTR::null(),
            &startup,
            &mut process,
        )
    }
    .map_err(io_error)?;

    drop(HandleGuard::new(process.hThread));
    drop(HandleGuard::new(process.hProcess));
    Ok(process.dwProcessId)
}

pub fn allow_foreground(pid: u32) -> io::Result<()> {
    unsafe { AllowSetForegroundWindow(pid) }.map_err(io_error)
}
