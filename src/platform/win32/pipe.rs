// 结果管道的服务端：单实例、仅入站、消息模式、重叠 I/O

use std::io;
use tracing::debug;

use windows::core::PCWSTR;
use windows::Win32::Foundation::{
    LocalFree, ERROR_IO_PENDING, ERROR_MORE_DATA, ERROR_PIPE_CONNECTED, ERROR_PIPE_NOT_CONNECTED, FALSE, HLOCAL,
    WAIT_OBJECT_0,
};
use windows::Win32::Security::Authorization::{
    ConvertStringSecurityDescriptorToSecurityDescriptorW, SDDL_REVISION_1,
};
use windows::Win32::Security::{PSECURITY_DESCRIPTOR, SECURITY_ATTRIBUTES};
use windows::Win32::Storage::FileSystem::{ReadFile, FILE_FLAG_OVERLAPPED, PIPE_ACCESS_INBOUND};
use windows::Win32::System::IO::{CancelIo, GetOverlappedResult, OVERLAPPED};
use windows::Win32::System::Pipes::{
    ConnectNamedPipe, CreateNamedPipeW, DisconnectNamedPipe, PIPE_READMODE_MESSAGE, PIPE_REJECT_REMOTE_CLIENTS,
    PIPE_TYPE_MESSAGE,
};
use windows::Win32::System::Threading::{CreateEventW, ResetEvent, WaitForMultipleObjects, INFINITE};

use super::{io_error, HandleGuard, WindowsWorker};
use crate::stream::{Chunk, Listen, PipeName, Race, ResultPipe};
use crate::utils::wide::to_wide_null;

pub struct NamedResultPipe {
    name: PipeName,
    pipe: HandleGuard,
    event: HandleGuard,
    // 挂起的 I/O 期间地址不能变
    overlapped: Box<OVERLAPPED>,
    pending: bool,
}

impl NamedResultPipe {
    /// 创建管道；返回后客户端即可连接
    pub fn create(name: PipeName, sddl: &str) -> io::Result<Self> {
        let wide_sddl = to_wide_null(sddl);
        let mut sd = PSECURITY_DESCRIPTOR::default();
        unsafe {
            ConvertStringSecurityDescriptorToSecurityDescriptorW(
                PCWSTR(wide_sddl.as_ptr()),
                SDDL_REVISION_1 as u32,
                &mut sd,
                None,
            )
        }
        .map_err(io_error)?;

        let sa = SECURITY_ATTRIBUTES {
            nLength: std::mem::size_of::<SECURITY_ATTRIBUTES>() as u32,
            lpSecurityDescriptor: sd.0,
            bInheritHandle: FALSE,
        };

        let wide_name = to_wide_null(name.as_str());
        let handle = unsafe {
            CreateNamedPipeW(
                PCWSTR(wide_name.as_ptr()),
                PIPE_ACCESS_INBOUND | FILE_FLAG_OVERLAPPED,
                PIPE_TYPE_MESSAGE | PIPE_READMODE_MESSAGE | PIPE_REJECT_REMOTE_CLIENTS,
                1,
                0,
                0,
                0,
                Some(&sa),
            )
        };
        let create_error = io::Error::last_os_error();
        unsafe {
            let _ = LocalFree(HLOCAL(sd.0));
        }
        if handle.is_invalid() {
            return Err(create_error);
        }
        let pipe = HandleGuard::new(handle);

        let event = unsafe { CreateEventW(None, true, false, PCWSTR::null()) }.map_err(io_error)?;

        debug!("Result pipe {} created", name);
        Ok(Self {
            name,
            pipe,
            event: HandleGuard::new(event),
            overlapped: Box::default(),
            pending: false,
        })
    }

    fn reset_overlapped(&mut self) -> *mut OVERLAPPED {
        *self.overlapped = OVERLAPPED {
            hEvent: self.event.raw(),
            ..Default::default()
        };
        &mut *self.overlapped
    }
}

impl ResultPipe for NamedResultPipe {
    type Worker = WindowsWorker;

    fn name(&self) -> &PipeName {
        &self.name
    }

    fn listen(&mut self) -> io::Result<Listen> {
        unsafe { ResetEvent(self.event.raw()) }.map_err(io_error)?;
        let overlapped = self.reset_overlapped();

        match unsafe { ConnectNamedPipe(self.pipe.raw(), Some(overlapped)) } {
            Ok(()) => Ok(Listen::Connected),
            Err(e) if e.code() == ERROR_PIPE_CONNECTED.to_hresult() => Ok(Listen::Connected),
            Err(e) if e.code() == ERROR_IO_PENDING.to_hresult() => {
                self.pending = true;
                Ok(Listen::Pending)
            }
            Err(e) => Err(io_error(e)),
        }
    }

    fn wait_connection(&mut self, worker: &WindowsWorker) -> io::Result<Race> {
        let handles = [self.event.raw(), worker.handle()];
        let signaled = unsafe { WaitForMultipleObjects(&handles, false, INFINITE) };

        if signaled == WAIT_OBJECT_0 {
            let mut transferred = 0u32;
            let overlapped: *const OVERLAPPED = &*self.overlapped;
            let connected = unsafe { GetOverlappedResult(self.pipe.raw(), overlapped, &mut transferred, false) };
            self.pending = false;
            connected.map_err(io_error)?;
            Ok(Race::Connected)
        } else if signaled.0 == WAIT_OBJECT_0.0 + 1 {
            debug!("Worker {} exited while waiting for a connection", worker.pid());
            Ok(Race::WorkerExited)
        } else {
            Err(io::Error::last_os_error())
        }
    }

    fn cancel_listen(&mut self) -> io::Result<()> {
        if !self.pending {
            return Ok(());
        }
        unsafe { CancelIo(self.pipe.raw()) }.map_err(io_error)?;

        // 等取消真正完成，之后 OVERLAPPED 才能复用或释放
        let mut transferred = 0u32;
        let overlapped: *const OVERLAPPED = &*self.overlapped;
        let _ = unsafe { GetOverlappedResult(self.pipe.raw(), overlapped, &mut transferred, true) };
        self.pending = false;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u16]) -> io::Result<Chunk> {
        let overlapped = self.reset_overlapped();
        let bytes = unsafe { std::slice::from_raw_parts_mut(buf.as_mut_ptr().cast::<u8>(), buf.len() * 2) };

        if let Err(e) = unsafe { ReadFile(self.pipe.raw(), Some(bytes), None, Some(overlapped)) } {
            if e.code() != ERROR_IO_PENDING.to_hresult() && e.code() != ERROR_MORE_DATA.to_hresult() {
                return Err(io_error(e));
            }
        }

        let mut transferred = 0u32;
        let finished = unsafe { GetOverlappedResult(self.pipe.raw(), overlapped, &mut transferred, true) };
        let units = transferred as usize / 2;
        match finished {
            Ok(()) => Ok(Chunk::Complete(units)),
            Err(e) if e.code() == ERROR_MORE_DATA.to_hresult() => Ok(Chunk::Partial(units)),
            Err(e) => Err(io_error(e)),
        }
    }

    fn disconnect(&mut self) -> io::Result<()> {
        match unsafe { DisconnectNamedPipe(self.pipe.raw()) } {
            Ok(()) => Ok(()),
            Err(e) if e.code() == ERROR_PIPE_NOT_CONNECTED.to_hresult() => Ok(()),
            Err(e) => Err(io_error(e)),
        }
    }
}

impl Drop for NamedResultPipe {
    fn drop(&mut self) {
        if let Err(e) = self.cancel_listen() {
            debug!("Cancel on drop failed: {}", e);
        }
    }
}
