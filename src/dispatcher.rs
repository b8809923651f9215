// 命令派发：定位目标 → 准备结果管道 → 发送命令 → 等待 worker

use std::io::Write;
use tracing::{error, info, warn};

use crate::channel::{self, CommandPayload, CommandSender};
use crate::config::DispatchConfig;
use crate::core::{CommandRequest, ExitOutcome, TargetReply};
use crate::elevation::{self, DirectLauncher, TaskTrigger};
use crate::error::DispatchError;
use crate::locator;
use crate::stream::{OutputConsole, PipeFactory, PipeName, ResultPipe};
use crate::wait;

/// 启动器依赖的全部系统能力
pub trait Host: CommandSender + PipeFactory + OutputConsole + TaskTrigger + DirectLauncher {}

impl<T> Host for T where T: CommandSender + PipeFactory + OutputConsole + TaskTrigger + DirectLauncher {}

pub struct Dispatcher<'a, H: Host> {
    host: &'a H,
    config: &'a DispatchConfig,
}

impl<'a, H: Host> Dispatcher<'a, H> {
    pub fn new(host: &'a H, config: &'a DispatchConfig) -> Self {
        Self { host, config }
    }

    /// 执行一次请求，所有失败都折算成退出码
    pub fn dispatch<W: Write + ?Sized>(&self, request: &CommandRequest, out: &mut W) -> ExitOutcome {
        match self.try_dispatch(request, out) {
            Ok(code) => ExitOutcome::new(code),
            Err(e) => {
                error!("❌ {}", e);
                ExitOutcome::from(e.run_result())
            }
        }
    }

    fn try_dispatch<W: Write + ?Sized>(
        &self,
        request: &CommandRequest,
        out: &mut W,
    ) -> Result<i32, DispatchError> {
        let window = locator::find_or_start(
            self.host,
            &self.config.locator,
            &self.config.window_class,
            || match elevation::start_target(self.host, &self.config.elevation, "") {
                Ok(_) => true,
                Err(e) => {
                    warn!("{}", e);
                    false
                }
            },
        )?;

        let mode = request.mode();

        // 管道必须在命令发出之前建好，目标才能按名字连上
        let (pipe, payload) = if mode.stream {
            if !self.host.ensure_output() {
                return Err(DispatchError::NoOutput);
            }
            let pipe = self.create_pipe()?;
            let payload = CommandPayload::with_result_pipe(mode, pipe.name(), request.text());
            (Some(pipe), payload)
        } else {
            (None, CommandPayload::new(mode, request.text()))
        };

        let reply = channel::send(self.host, window, &payload);

        let pid = match reply {
            TargetReply::Dispatched { worker_pid } => worker_pid,
            // 在目标线程中同步执行完毕；请求了输出时没有 worker 可以转发
            TargetReply::TargetThread if !mode.stream => return Ok(0),
            TargetReply::Unrecognized(code) => {
                if mode.wait {
                    return Err(DispatchError::UntrustedWorker(code));
                }
                return Ok(code);
            }
            other => return Ok(other.code() - 1),
        };

        if !mode.wait {
            info!("Command dispatched to worker {}", pid);
            return Ok(pid as i32);
        }

        wait::wait_for_exit(self.host, pid, pipe.map(|pipe| (pipe, out)))
    }

    fn create_pipe(&self) -> Result<H::Pipe, DispatchError> {
        let name = PipeName::new(&self.config.pipe_prefix, self.host.instance_id());
        self.host
            .create_pipe(&name, &self.config.pipe_sddl)
            .map_err(|source| DispatchError::PipeCreate {
                name: name.to_string(),
                source,
            })
    }
}
