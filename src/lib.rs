// iLauncher 命令行启动器 - 核心模块
pub mod channel;
pub mod config;
pub mod core;
pub mod dispatcher;
pub mod elevation;
pub mod error;
pub mod invocation;
pub mod locator;
pub mod logging;
pub mod platform;
pub mod stream;
pub mod utils;
pub mod wait;

use std::io::Write;
use tracing::{error, info, warn};

use config::DispatchConfig;
use dispatcher::{Dispatcher, Host};
use elevation::SessionLauncher;
use invocation::Invocation;

/// 程序入口，返回进程退出码
pub fn run() -> i32 {
    logging::init();

    let config = match config::load_config() {
        Ok(config) => config,
        Err(e) => {
            warn!("Failed to load config, using defaults: {:#}", e);
            let mut config = DispatchConfig::default();
            config.apply_overrides(|key| std::env::var(key).ok());
            config
        }
    };

    let raw = invocation::raw_command_line();
    info!("Command line: {:?}", raw);

    let exit_code = run_invocation(Invocation::parse(&raw), config);
    info!("Exiting with code {}", exit_code);
    exit_code
}

#[cfg(target_os = "windows")]
fn run_invocation(invocation: Invocation, mut config: DispatchConfig) -> i32 {
    config.elevation.target_exe = platform::win32::beside_current_exe(&config.elevation.target_exe);

    let host = platform::WindowsHost::new(&config);
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    execute(&host, &config, invocation, &mut out)
}

#[cfg(not(target_os = "windows"))]
fn run_invocation(invocation: Invocation, _config: DispatchConfig) -> i32 {
    match invocation {
        Invocation::Nothing => 0,
        other => {
            error!("❌ {:?} is only supported on Windows", other);
            core::RunResult::NoTarget.code()
        }
    }
}

/// 执行一次解析好的调用
pub fn execute<H, W>(host: &H, config: &DispatchConfig, invocation: Invocation, out: &mut W) -> i32
where
    H: Host + SessionLauncher,
    W: Write + ?Sized,
{
    match invocation {
        Invocation::Nothing => 0,
        Invocation::Elevate(args) => match elevation::start_target(host, &config.elevation, &args) {
            Ok(mode) => mode.exit_code(),
            Err(e) => {
                error!("❌ {}", e);
                -1
            }
        },
        Invocation::SessionLaunch(args) => match elevation::launch_from_task(host, &config.elevation, &args) {
            Ok(_) => 0,
            Err(e) => {
                error!("❌ {}", e);
                e.code()
            }
        },
        Invocation::Command(request) => Dispatcher::new(host, config).dispatch(&request, out).exit_code,
    }
}
