// 错误类型定义

use std::io;
use thiserror::Error;

use crate::core::RunResult;

/// 结果管道的失败原因，OS 错误码只写日志，不进入退出码
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("failed to listen on result pipe: {0}")]
    Listen(#[source] io::Error),

    #[error("failed to wait for pipe connection or worker exit: {0}")]
    Wait(#[source] io::Error),

    #[error("failed to read from result pipe: {0}")]
    Read(#[source] io::Error),
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("target application could not be located or started")]
    TargetUnavailable,

    #[error("no console output available for streaming")]
    NoOutput,

    #[error("failed to create result pipe {name}: {source}")]
    PipeCreate {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("target reply {0} does not identify a worker process")]
    UntrustedWorker(i32),

    #[error("failed to open worker process {pid}: {source}")]
    OpenWorker {
        pid: u32,
        #[source]
        source: io::Error,
    },

    #[error("failed to wait for worker process {pid}: {source}")]
    Wait {
        pid: u32,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Stream(#[from] StreamError),
}

impl DispatchError {
    /// 映射到启动器的退出码
    pub fn run_result(&self) -> RunResult {
        match self {
            Self::TargetUnavailable => RunResult::NoTarget,
            Self::NoOutput | Self::PipeCreate { .. } | Self::Stream(_) => RunResult::CannotGetResult,
            Self::UntrustedWorker(_) | Self::OpenWorker { .. } | Self::Wait { .. } => {
                RunResult::CannotWait
            }
        }
    }
}

/// 计划任务触发失败，`code()` 为对外的数字原因
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task scheduler service object unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("cannot connect to task scheduler: {0}")]
    Connect(String),

    #[error("task folder {0} not found")]
    FolderMissing(String),

    #[error("scheduled task {0} not found")]
    TaskMissing(String),

    #[error("failed to run scheduled task {name}: {reason}")]
    RunFailed { name: String, reason: String },
}

impl TaskError {
    pub fn code(&self) -> i32 {
        match self {
            Self::ServiceUnavailable(_) => 1,
            Self::Connect(_) => 2,
            Self::FolderMissing(_) => 3,
            Self::TaskMissing(_) => 4,
            Self::RunFailed { .. } => 5,
        }
    }
}

/// 以 SYSTEM 身份在用户会话中启动目标时的失败原因
#[derive(Debug, Error)]
pub enum SessionLaunchError {
    #[error("no active interactive session")]
    NoActiveSession,

    #[error("cannot obtain user token for session {session}: {reason}")]
    UserToken { session: u32, reason: String },

    #[error("cannot build environment block: {0}")]
    EnvironmentBlock(String),

    #[error("cannot create process in user session: {0}")]
    CreateProcess(String),
}

impl SessionLaunchError {
    pub fn code(&self) -> i32 {
        match self {
            Self::NoActiveSession => 1,
            Self::UserToken { .. } => 2,
            Self::EnvironmentBlock(_) => 3,
            Self::CreateProcess(_) => 4,
        }
    }
}

/// 提权启动和直接启动都失败
#[derive(Debug, Error)]
#[error("elevated start failed ({task}) and direct start failed: {source}")]
pub struct ElevationError {
    pub task: TaskError,
    #[source]
    pub source: io::Error,
}
