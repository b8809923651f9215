// 结果流汇合点
//
// 启动器创建一个只属于本次调用的消息模式管道，把管道名随命令发给目标。
// worker 可以多次连接、每次写一条消息后断开；启动器在"有连接到来"和
// "worker 进程退出"两个事件之间做单线程的 wait-for-any，worker 退出是唯一
// 可靠的结束信号，即使它从未连接过管道。

pub mod naming;
pub mod transcode;

use std::io::{self, Write};
use tracing::{debug, error, info, warn};

use crate::error::StreamError;
use crate::wait::{WorkerOpener, WorkerProcess};

pub use naming::PipeName;
pub use transcode::Utf16Relay;

/// 每次读取的缓冲区大小（UTF-16 码元）
pub const CHUNK_UNITS: usize = 5000;

/// 开始监听时的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listen {
    /// 客户端在开始监听前已经连上
    Connected,
    /// 异步 accept 已挂起
    Pending,
}

/// 等待的两个事件中先发生的那个
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Race {
    Connected,
    WorkerExited,
}

/// 一次读取的结果（单位：UTF-16 码元）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chunk {
    /// 消息还有剩余数据
    Partial(usize),
    /// 消息已读完
    Complete(usize),
}

/// 结果管道的服务端
///
/// 丢弃时必须释放管道对象和等待事件。
pub trait ResultPipe {
    type Worker: WorkerProcess;

    fn name(&self) -> &PipeName;

    /// 开始非阻塞地等待连接
    fn listen(&mut self) -> io::Result<Listen>;

    /// 在连接完成和 worker 退出之间等待先发生者
    fn wait_connection(&mut self, worker: &Self::Worker) -> io::Result<Race>;

    /// 取消挂起的 accept，并等它真正结束
    fn cancel_listen(&mut self) -> io::Result<()>;

    fn read(&mut self, buf: &mut [u16]) -> io::Result<Chunk>;

    /// 断开当前客户端，管道回到可监听状态；没有客户端时什么也不做
    fn disconnect(&mut self) -> io::Result<()>;
}

/// 能创建结果管道的宿主
pub trait PipeFactory: WorkerOpener {
    type Pipe: ResultPipe<Worker = Self::Worker>;

    /// 用于生成唯一管道名的实例 ID（调用线程 ID）
    fn instance_id(&self) -> u32;

    /// 创建管道；返回时管道必须已可被连接
    fn create_pipe(&self, name: &PipeName, sddl: &str) -> io::Result<Self::Pipe>;
}

/// 标准输出是否可用；流式请求在发送命令前确认
pub trait OutputConsole {
    fn ensure_output(&self) -> bool;
}

/// 一次汇合的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamSummary {
    pub connections: usize,
    pub messages: usize,
    pub bytes: u64,
}

/// 转发 worker 写入管道的全部输出，直到 worker 退出
///
/// 管道在此被消费，任何返回路径上都会被释放。
pub fn stream_and_wait<P, W>(
    pipe: P,
    worker: &P::Worker,
    out: &mut W,
) -> Result<StreamSummary, StreamError>
where
    P: ResultPipe,
    W: Write + ?Sized,
{
    Rendezvous::new(pipe, out).run(worker)
}

struct Rendezvous<'o, P, W: ?Sized> {
    pipe: P,
    out: &'o mut W,
    relay: Utf16Relay,
    buf: Vec<u16>,
    summary: StreamSummary,
    output_failed: bool,
}

impl<'o, P, W> Rendezvous<'o, P, W>
where
    P: ResultPipe,
    W: Write + ?Sized,
{
    fn new(pipe: P, out: &'o mut W) -> Self {
        Self {
            pipe,
            out,
            relay: Utf16Relay::new(),
            buf: vec![0; CHUNK_UNITS],
            summary: StreamSummary::default(),
            output_failed: false,
        }
    }

    fn run(mut self, worker: &P::Worker) -> Result<StreamSummary, StreamError> {
        info!("📡 Waiting for results on {}", self.pipe.name());

        loop {
            match self.pipe.listen().map_err(StreamError::Listen)? {
                Listen::Connected => debug!("Client was already connected"),
                Listen::Pending => match self.pipe.wait_connection(worker).map_err(StreamError::Wait)? {
                    Race::Connected => debug!("Client connected"),
                    Race::WorkerExited => {
                        if let Err(e) = self.pipe.cancel_listen() {
                            warn!("Failed to cancel pending connect: {}", e);
                        }
                        info!(
                            "✓ Worker exited ({} connections, {} messages, {} bytes relayed)",
                            self.summary.connections, self.summary.messages, self.summary.bytes
                        );
                        return Ok(self.summary);
                    }
                },
            }

            self.summary.connections += 1;
            let relayed = self.relay_message();

            if let Err(e) = self.pipe.disconnect() {
                warn!("Failed to disconnect result pipe: {}", e);
            }

            if let Err(e) = relayed {
                error!("❌ Result pipe read failed: {}", e);
                return Err(StreamError::Read(e));
            }
        }
    }

    /// 读完一条消息并转发；"还有数据"时不让出控制
    fn relay_message(&mut self) -> io::Result<()> {
        loop {
            let (n, complete) = match self.pipe.read(&mut self.buf)? {
                Chunk::Partial(n) => (n, false),
                Chunk::Complete(n) => (n, true),
            };

            let bytes = self.relay.push(&self.buf[..n]);
            self.summary.bytes += bytes.len() as u64;
            emit(self.out, &mut self.output_failed, bytes);

            if complete || n == 0 {
                let bytes = self.relay.finish();
                self.summary.bytes += bytes.len() as u64;
                emit(self.out, &mut self.output_failed, bytes);
                if !self.output_failed {
                    if let Err(e) = self.out.flush() {
                        warn!("Failed to flush output: {}", e);
                        self.output_failed = true;
                    }
                }
                self.summary.messages += 1;
                return Ok(());
            }
        }
    }
}

/// 输出失败只记录一次，继续读管道以免阻塞 worker
fn emit<W: Write + ?Sized>(out: &mut W, failed: &mut bool, bytes: &[u8]) {
    if *failed || bytes.is_empty() {
        return;
    }
    if let Err(e) = out.write_all(bytes) {
        warn!("Failed to write relayed output: {}", e);
        *failed = true;
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! 内存中的结果管道，按脚本模拟连接、读取和 worker 退出

    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    use crate::wait::WorkerProcess;

    #[derive(Debug, Clone)]
    pub enum FakeRead {
        Partial(Vec<u16>),
        Complete(Vec<u16>),
        Fail(io::ErrorKind),
    }

    impl FakeRead {
        pub fn message(s: &str) -> Self {
            Self::Complete(s.encode_utf16().collect())
        }

        pub fn part(s: &str) -> Self {
            Self::Partial(s.encode_utf16().collect())
        }
    }

    /// 每次 listen 时发生的事
    #[derive(Debug, Clone)]
    pub enum Cycle {
        /// `early` 为真表示开始监听前客户端已连上
        Connect { early: bool, reads: Vec<FakeRead> },
        WorkerExit,
        ListenFails,
        WaitFails,
    }

    #[derive(Debug, Default)]
    enum State {
        #[default]
        Idle,
        Pending(Vec<FakeRead>),
        PendingExit,
        PendingError,
        Connected,
    }

    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct FakeWorker {
        pub exit_code: u32,
    }

    impl WorkerProcess for FakeWorker {
        fn wait(&self) -> io::Result<()> {
            Ok(())
        }

        fn exit_code(&self) -> io::Result<u32> {
            Ok(self.exit_code)
        }
    }

    pub type CallLog = Rc<RefCell<Vec<&'static str>>>;

    pub struct FakePipe {
        name: PipeName,
        cycles: VecDeque<Cycle>,
        reads: VecDeque<FakeRead>,
        state: State,
        pub calls: CallLog,
    }

    impl FakePipe {
        pub fn new(cycles: Vec<Cycle>) -> Self {
            Self {
                name: PipeName::new("fake-", 1),
                cycles: cycles.into(),
                reads: VecDeque::new(),
                state: State::Idle,
                calls: CallLog::default(),
            }
        }

        pub fn with_name(mut self, name: PipeName) -> Self {
            self.name = name;
            self
        }

        fn record(&self, call: &'static str) {
            self.calls.borrow_mut().push(call);
        }
    }

    impl Drop for FakePipe {
        fn drop(&mut self) {
            self.record("drop");
        }
    }

    impl ResultPipe for FakePipe {
        type Worker = FakeWorker;

        fn name(&self) -> &PipeName {
            &self.name
        }

        fn listen(&mut self) -> io::Result<Listen> {
            self.record("listen");
            match self.cycles.pop_front().unwrap_or(Cycle::WorkerExit) {
                Cycle::Connect { early: true, reads } => {
                    self.reads = reads.into();
                    self.state = State::Connected;
                    Ok(Listen::Connected)
                }
                Cycle::Connect { early: false, reads } => {
                    self.state = State::Pending(reads);
                    Ok(Listen::Pending)
                }
                Cycle::WorkerExit => {
                    self.state = State::PendingExit;
                    Ok(Listen::Pending)
                }
                Cycle::WaitFails => {
                    self.state = State::PendingError;
                    Ok(Listen::Pending)
                }
                Cycle::ListenFails => Err(io::Error::new(io::ErrorKind::Other, "listen failed")),
            }
        }

        fn wait_connection(&mut self, _worker: &FakeWorker) -> io::Result<Race> {
            self.record("wait");
            match std::mem::take(&mut self.state) {
                State::Pending(reads) => {
                    self.reads = reads.into();
                    self.state = State::Connected;
                    Ok(Race::Connected)
                }
                State::PendingExit => Ok(Race::WorkerExited),
                State::PendingError => Err(io::Error::new(io::ErrorKind::Other, "wait failed")),
                other => panic!("wait_connection in state {:?}", other),
            }
        }

        fn cancel_listen(&mut self) -> io::Result<()> {
            self.record("cancel");
            Ok(())
        }

        fn read(&mut self, buf: &mut [u16]) -> io::Result<Chunk> {
            self.record("read");
            assert_eq!(buf.len(), CHUNK_UNITS);
            assert!(matches!(self.state, State::Connected), "read without connection");
            match self.reads.pop_front() {
                Some(FakeRead::Partial(units)) => {
                    buf[..units.len()].copy_from_slice(&units);
                    Ok(Chunk::Partial(units.len()))
                }
                Some(FakeRead::Complete(units)) => {
                    buf[..units.len()].copy_from_slice(&units);
                    Ok(Chunk::Complete(units.len()))
                }
                Some(FakeRead::Fail(kind)) => Err(io::Error::new(kind, "read failed")),
                None => Err(io::Error::new(io::ErrorKind::BrokenPipe, "client gone")),
            }
        }

        fn disconnect(&mut self) -> io::Result<()> {
            self.record("disconnect");
            self.state = State::Idle;
            Ok(())
        }
    }
}
