// 通过任务计划程序 COM 接口运行已注册的任务

use tracing::debug;

use windows::core::{BSTR, VARIANT};
use windows::Win32::System::Com::{CoCreateInstance, CoInitializeEx, CoUninitialize, CLSCTX_INPROC_SERVER, COINIT_MULTITHREADED};
use windows::Win32::System::TaskScheduler::{ITaskService, TaskScheduler};

use crate::error::TaskError;

/// 本线程的 COM 初始化，成功时离开作用域反初始化
struct ComApartment {
    initialized: bool,
}

impl ComApartment {
    fn enter() -> Self {
        let hr = unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) };
        // 已用其他线程模型初始化时 hr 为 RPC_E_CHANGED_MODE，COM 仍可用
        Self {
            initialized: hr.is_ok(),
        }
    }
}

impl Drop for ComApartment {
    fn drop(&mut self) {
        if self.initialized {
            unsafe { CoUninitialize() };
        }
    }
}

pub fn run_task(folder: &str, task: &str, argument: &str) -> Result<(), TaskError> {
    let _com = ComApartment::enter();

    let service: ITaskService = unsafe { CoCreateInstance(&TaskScheduler, None, CLSCTX_INPROC_SERVER) }
        .map_err(|e| TaskError::ServiceUnavailable(e.message()))?;

    let empty = VARIANT::default();
    unsafe { service.Connect(&empty, &empty, &empty, &empty) }.map_err(|e| TaskError::Connect(e.message()))?;

    let folder_path = if folder.starts_with('\\') {
        folder.to_string()
    } else {
        format!("\\{}", folder)
    };
    let task_folder = unsafe { service.GetFolder(&BSTR::from(folder_path.as_str())) }
        .map_err(|_| TaskError::FolderMissing(folder_path.clone()))?;

    let registered = unsafe { task_folder.GetTask(&BSTR::from(task)) }
        .map_err(|_| TaskError::TaskMissing(task.to_string()))?;

    let params = if argument.is_empty() {
        VARIANT::default()
    } else {
        VARIANT::from(BSTR::from(argument))
    };
    unsafe { registered.Run(&params) }.map_err(|e| TaskError::RunFailed {
        name: task.to_string(),
        reason: e.message(),
    })?;

    debug!("Task {}\\{} started", folder_path, task);
    Ok(())
}
