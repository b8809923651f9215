// worker 进程句柄

use std::io;

use windows::Win32::Foundation::{HANDLE, WAIT_FAILED};
use windows::Win32::System::Threading::{
    GetExitCodeProcess, OpenProcess, WaitForSingleObject, INFINITE, PROCESS_QUERY_LIMITED_INFORMATION,
    PROCESS_SYNCHRONIZE,
};

use super::{io_error, HandleGuard};
use crate::wait::WorkerProcess;

pub struct WindowsWorker {
    pid: u32,
    handle: HandleGuard,
}

impl WindowsWorker {
    /// 只申请同步和有限查询权限，普通用户也能打开提权进程
    pub fn open(pid: u32) -> io::Result<Self> {
        let handle = unsafe { OpenProcess(PROCESS_SYNCHRONIZE | PROCESS_QUERY_LIMITED_INFORMATION, false, pid) }
            .map_err(io_error)?;
        Ok(Self {
            pid,
            handle: HandleGuard::new(handle),
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub(crate) fn handle(&self) -> HANDLE {
        self.handle.raw()
    }
}

impl WorkerProcess for WindowsWorker {
    fn wait(&self) -> io::Result<()> {
        let result = unsafe { WaitForSingleObject(self.handle(), INFINITE) };
        if result == WAIT_FAILED {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn exit_code(&self) -> io::Result<u32> {
        let mut code = 0u32;
        unsafe { GetExitCodeProcess(self.handle(), &mut code) }.map_err(io_error)?;
        Ok(code)
    }
}
