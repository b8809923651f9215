// 目标的控制窗口：仅消息窗口 + WM_COPYDATA

use std::ffi::c_void;
use tracing::debug;

use windows::core::PCWSTR;
use windows::Win32::Foundation::{HWND, LPARAM, WPARAM};
use windows::Win32::System::DataExchange::COPYDATASTRUCT;
use windows::Win32::UI::WindowsAndMessaging::{FindWindowExW, SendMessageW, HWND_MESSAGE, WM_COPYDATA};

use crate::channel::CommandPayload;
use crate::utils::wide::to_wide_null;

/// 按类名查找仅消息窗口
pub fn find_message_window(class_name: &str) -> Option<HWND> {
    let class = to_wide_null(class_name);
    let found = unsafe { FindWindowExW(HWND_MESSAGE, HWND::default(), PCWSTR(class.as_ptr()), PCWSTR::null()) };
    match found {
        Ok(hwnd) if !hwnd.is_invalid() => Some(hwnd),
        _ => None,
    }
}

/// 同步发送 WM_COPYDATA：wParam 是模式位，正文是不含 NUL 的 UTF-16
pub fn send_copydata(window: HWND, tag: usize, payload: &CommandPayload) -> isize {
    let units = payload.to_utf16();
    let data = COPYDATASTRUCT {
        dwData: tag,
        cbData: (units.len() * 2) as u32,
        lpData: units.as_ptr() as *mut c_void,
    };
    debug!("WM_COPYDATA: {} bytes, tag {}", data.cbData, tag);

    let result = unsafe {
        SendMessageW(
            window,
            WM_COPYDATA,
            WPARAM(payload.mode().bits()),
            LPARAM(&data as *const COPYDATASTRUCT as isize),
        )
    };
    result.0
}
