// 等待 worker 进程退出并取得退出码

use std::io::{self, Write};
use tracing::{info, warn};

use crate::core::EXIT_CODE_UNKNOWN;
use crate::error::DispatchError;
use crate::stream::{self, ResultPipe};

/// 已打开的 worker 进程句柄（只有同步和有限查询权限）
pub trait WorkerProcess {
    /// 无限期阻塞直到进程退出
    fn wait(&self) -> io::Result<()>;

    fn exit_code(&self) -> io::Result<u32>;
}

pub trait WorkerOpener {
    type Worker: WorkerProcess;

    fn open_worker(&self, pid: u32) -> io::Result<Self::Worker>;
}

/// 等待 worker 退出；给了结果管道时一边等待一边转发输出
///
/// 退出码查询失败时返回 [`EXIT_CODE_UNKNOWN`]，而不是一个看似正常的数字。
pub fn wait_for_exit<O, P, W>(
    opener: &O,
    pid: u32,
    result_pipe: Option<(P, &mut W)>,
) -> Result<i32, DispatchError>
where
    O: WorkerOpener,
    P: ResultPipe<Worker = O::Worker>,
    W: Write + ?Sized,
{
    let worker = opener
        .open_worker(pid)
        .map_err(|source| DispatchError::OpenWorker { pid, source })?;

    match result_pipe {
        Some((pipe, out)) => {
            stream::stream_and_wait(pipe, &worker, out)?;
        }
        None => {
            info!("⏳ Waiting for worker process {}", pid);
            worker
                .wait()
                .map_err(|source| DispatchError::Wait { pid, source })?;
        }
    }

    let exit_code = match worker.exit_code() {
        Ok(code) => code as i32,
        Err(e) => {
            warn!("Cannot get exit code of worker {}: {}", pid, e);
            EXIT_CODE_UNKNOWN
        }
    };
    info!("✓ Worker {} exited with code {}", pid, exit_code);

    Ok(exit_code)
}
