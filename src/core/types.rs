// Rust 核心类型定义

use std::fmt;

/// 命令模式（发送给目标的 wParam）
///
/// bit0 = 等待完成，bit1 = 等待并回传输出。流式输出总是隐含等待。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Mode {
    pub wait: bool,
    pub stream: bool,
}

impl Mode {
    pub const FIRE_AND_FORGET: Mode = Mode { wait: false, stream: false };
    pub const WAIT: Mode = Mode { wait: true, stream: false };
    pub const WAIT_AND_STREAM: Mode = Mode { wait: true, stream: true };

    const WAIT_BIT: usize = 1;
    const STREAM_BIT: usize = 2;

    pub fn bits(self) -> usize {
        let mut bits = 0;
        if self.wait || self.stream {
            bits |= Self::WAIT_BIT;
        }
        if self.stream {
            bits |= Self::STREAM_BIT;
        }
        bits
    }

    pub fn from_bits(bits: usize) -> Self {
        let stream = bits & Self::STREAM_BIT != 0;
        Self {
            wait: stream || bits & Self::WAIT_BIT != 0,
            stream,
        }
    }
}

/// 一次调用对应的命令请求，构造后不可变
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    text: String,
    mode: Mode,
}

impl CommandRequest {
    pub fn new(text: impl Into<String>, mode: Mode) -> Self {
        let mode = Mode::from_bits(mode.bits());
        Self {
            text: text.into(),
            mode,
        }
    }

    /// 解析命令字符串：`*` 前缀 = 等待，`**` 前缀 = 等待并回传输出
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix('*') {
            Some(rest) => match rest.strip_prefix('*') {
                Some(text) => Self::new(text, Mode::WAIT_AND_STREAM),
                None => Self::new(rest, Mode::WAIT),
            },
            None => Self::new(raw, Mode::FIRE_AND_FORGET),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn wants_wait(&self) -> bool {
        self.mode.wait
    }

    pub fn wants_stream(&self) -> bool {
        self.mode.stream
    }
}

/// 启动器自身的退出码分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum RunResult {
    Failed = 0,
    Deferred = -1,
    NotFound = -2,
    /// 命令在目标自己的线程中同步执行，没有独立的 worker 进程
    TargetThread = -3,
    NoTarget = -10,
    CannotWait = -11,
    CannotGetResult = -12,
}

impl RunResult {
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// 无法获取 worker 退出码时使用的哨兵值
pub const EXIT_CODE_UNKNOWN: i32 = i32::MIN;

/// 目标对 WM_COPYDATA 的同步回复（v1 回复格式）
///
/// 正数是被派发的 worker 进程 ID；0、-1、-2、-3 对应 [`RunResult`]；
/// 其他负数无法识别，不能当作进程 ID 使用。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetReply {
    Failed,
    Deferred,
    NotFound,
    TargetThread,
    Dispatched { worker_pid: u32 },
    Unrecognized(i32),
}

impl TargetReply {
    /// 目标的处理函数按 32 位整数返回，高 32 位不可信，先截断再分类
    pub fn decode(raw: isize) -> Self {
        match raw as i32 {
            0 => Self::Failed,
            -1 => Self::Deferred,
            -2 => Self::NotFound,
            -3 => Self::TargetThread,
            pid if pid > 0 => Self::Dispatched { worker_pid: pid as u32 },
            other => Self::Unrecognized(other),
        }
    }

    /// 仅当命令确实派发给了 worker 时才返回进程 ID
    pub fn worker_pid(self) -> Option<u32> {
        match self {
            Self::Dispatched { worker_pid } => Some(worker_pid),
            _ => None,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Self::Failed => RunResult::Failed.code(),
            Self::Deferred => RunResult::Deferred.code(),
            Self::NotFound => RunResult::NotFound.code(),
            Self::TargetThread => RunResult::TargetThread.code(),
            Self::Dispatched { worker_pid } => worker_pid as i32,
            Self::Unrecognized(code) => code,
        }
    }
}

/// 启动器最终返回给操作系统的退出码
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitOutcome {
    pub exit_code: i32,
}

impl ExitOutcome {
    pub fn new(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

impl From<RunResult> for ExitOutcome {
    fn from(result: RunResult) -> Self {
        Self::new(result.code())
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "exit code {}", self.exit_code)
    }
}
