// Windows 宿主：把各个 trait 接到 Win32 API 上

mod console;
mod launch;
mod pipe;
mod process;
mod session;
mod task;
mod window;

use std::io;

use windows::Win32::Foundation::{CloseHandle, HANDLE, HWND};
use windows::Win32::System::Threading::GetCurrentThreadId;

use crate::channel::{CommandPayload, CommandSender};
use crate::config::DispatchConfig;
use crate::elevation::{DirectLauncher, SessionLauncher, SessionUser, TaskTrigger};
use crate::error::{SessionLaunchError, TaskError};
use crate::locator::ControlSurface;
use crate::stream::{OutputConsole, PipeFactory, PipeName};
use crate::wait::WorkerOpener;

pub use launch::beside_current_exe;
pub use pipe::NamedResultPipe;
pub use process::WindowsWorker;

/// 句柄守卫，离开作用域时关闭
pub(crate) struct HandleGuard(HANDLE);

impl HandleGuard {
    pub(crate) fn new(handle: HANDLE) -> Self {
        Self(handle)
    }

    pub(crate) fn raw(&self) -> HANDLE {
        self.0
    }
}

impl Drop for HandleGuard {
    fn drop(&mut self) {
        if !self.0.is_invalid() {
            unsafe {
                let _ = CloseHandle(self.0);
            }
        }
    }
}

pub(crate) fn io_error(e: windows::core::Error) -> io::Error {
    io::Error::other(e)
}

/// 真实的 Windows 宿主
pub struct WindowsHost {
    copydata_tag: usize,
}

impl WindowsHost {
    pub fn new(config: &DispatchConfig) -> Self {
        Self {
            copydata_tag: config.copydata_tag,
        }
    }
}

impl ControlSurface for WindowsHost {
    type Window = HWND;

    fn find_window(&self, class_name: &str) -> Option<HWND> {
        window::find_message_window(class_name)
    }
}

impl CommandSender for WindowsHost {
    fn send_command(&self, window: HWND, payload: &CommandPayload) -> isize {
        window::send_copydata(window, self.copydata_tag, payload)
    }
}

impl WorkerOpener for WindowsHost {
    type Worker = WindowsWorker;

    fn open_worker(&self, pid: u32) -> io::Result<WindowsWorker> {
        WindowsWorker::open(pid)
    }
}

impl PipeFactory for WindowsHost {
    type Pipe = NamedResultPipe;

    fn instance_id(&self) -> u32 {
        unsafe { GetCurrentThreadId() }
    }

    fn create_pipe(&self, name: &PipeName, sddl: &str) -> io::Result<NamedResultPipe> {
        NamedResultPipe::create(name.clone(), sddl)
    }
}

impl OutputConsole for WindowsHost {
    fn ensure_output(&self) -> bool {
        console::ensure_output()
    }
}

impl TaskTrigger for WindowsHost {
    fn run_task(&self, folder: &str, task: &str, argument: &str) -> Result<(), TaskError> {
        task::run_task(folder, task, argument)
    }
}

impl DirectLauncher for WindowsHost {
    fn launch_direct(&self, program: &str, arguments: &str) -> io::Result<u32> {
        launch::launch_direct(program, arguments)
    }

    fn allow_foreground(&self, pid: u32) -> io::Result<()> {
        launch::allow_foreground(pid)
    }
}

impl SessionLauncher for WindowsHost {
    fn launch_in_session_as(
        &self,
        user: SessionUser,
        elevated: bool,
        command_line: &str,
    ) -> Result<u32, SessionLaunchError> {
        session::launch_in_session_as(user, elevated, command_line)
    }
}
