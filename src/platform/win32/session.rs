// 以 SYSTEM 身份在活动控制台会话中、用登录用户的令牌启动进程

use std::ffi::c_void;
use tracing::{debug, info};

use windows::core::{PCWSTR, PWSTR};
use windows::Win32::Foundation::HANDLE;
use windows::Win32::Security::{
    GetTokenInformation, TokenElevationType, TokenElevationTypeLimited, TokenLinkedToken, TOKEN_ELEVATION_TYPE,
    TOKEN_LINKED_TOKEN,
};
use windows::Win32::System::Environment::{CreateEnvironmentBlock, DestroyEnvironmentBlock};
use windows::Win32::System::RemoteDesktop::{WTSGetActiveConsoleSessionId, WTSQueryUserToken};
use windows::Win32::System::Threading::{
    CreateProcessAsUserW, CREATE_UNICODE_ENVIRONMENT, PROCESS_INFORMATION, STARTF_FORCEOFFFEEDBACK, STARTUPINFOW,
};

use super::HandleGuard;
use crate::elevation::SessionUser;
use crate::error::SessionLaunchError;
use crate::utils::wide::to_wide_null;

const NO_SESSION: u32 = 0xFFFF_FFFF;

struct EnvironmentBlock(*mut c_void);

impl Drop for EnvironmentBlock {
    fn drop(&mut self) {
        unsafe {
            let _ = DestroyEnvironmentBlock(self.0);
        }
    }
}

pub fn launch_in_session_as(
    user: SessionUser,
    elevated: bool,
    command_line: &str,
) -> Result<u32, SessionLaunchError> {
    let session = match user {
        SessionUser::ActiveConsole => unsafe { WTSGetActiveConsoleSessionId() },
    };
    // 会话 0 是服务会话，没有用户桌面
    if session == 0 || session == NO_SESSION {
        return Err(SessionLaunchError::NoActiveSession);
    }

    let mut token = HANDLE::default();
    unsafe { WTSQueryUserToken(session, &mut token) }.map_err(|e| SessionLaunchError::UserToken {
        session,
        reason: e.message(),
    })?;
    let token = HandleGuard::new(token);

    let token = if elevated {
        match linked_token(&token) {
            Some(linked) => linked,
            None => token,
        }
    } else {
        token
    };

    let mut env = std::ptr::null_mut();
    unsafe { CreateEnvironmentBlock(&mut env, token.raw(), false) }
        .map_err(|e| SessionLaunchError::EnvironmentBlock(e.message()))?;
    let env = EnvironmentBlock(env);

    let mut desktop = to_wide_null("winsta0\\default");
    let startup = STARTUPINFOW {
        cb: std::mem::size_of::<STARTUPINFOW>() as u32,
        lpDesktop: PWSTR(desktop.as_mut_ptr()),
        dwFlags: STARTF_FORCEOFFFEEDBACK,
        ..Default::default()
    };
    let mut process = PROCESS_INFORMATION::default();
    let mut cmd = to_wide_null(command_line);

    unsafe {
        CreateProcessAsUserW(
            token.raw(),
            PCWSTR::null(),
            PWSTR(cmd.as_mut_ptr()),
            None,
            None,
            false,
            CREATE_UNICODE_ENVIRONMENT,
            Some(env.0 as *const c_void),
            PCWSTR::null(),
            &startup,
            &mut process,
        )
    }
    .map_err(|e| SessionLaunchError::CreateProcess(e.message()))?;

    drop(HandleGuard::new(process.hThread));
    drop(HandleGuard::new(process.hProcess));

    info!("✓ Started PID {} in session {}", process.dwProcessId, session);
    Ok(process.dwProcessId)
}

/// 只有受 UAC 限制的令牌才换成关联的完整令牌；对完整令牌取关联令牌得到的反而是受限令牌
fn needs_linked_token(elevation: TOKEN_ELEVATION_TYPE) -> bool {
    elevation == TokenElevationTypeLimited
}

fn elevation_type(token: &HandleGuard) -> Option<TOKEN_ELEVATION_TYPE> {
    let mut elevation = TOKEN_ELEVATION_TYPE::default();
    let mut returned = 0u32;
    let result = unsafe {
        GetTokenInformation(
            token.raw(),
            TokenElevationType,
            Some(&mut elevation as *mut TOKEN_ELEVATION_TYPE as *mut c_void),
            std::mem::size_of::<TOKEN_ELEVATION_TYPE>() as u32,
            &mut returned,
        )
    };
    match result {
        Ok(()) => Some(elevation),
        Err(e) => {
            debug!("TokenElevationType query failed: {}", e);
            None
        }
    }
}

/// 受限令牌所关联的完整令牌；未开启 UAC 或已是完整令牌时返回 None
fn linked_token(token: &HandleGuard) -> Option<HandleGuard> {
    let elevation = elevation_type(token)?;
    if !needs_linked_token(elevation) {
        debug!("Token elevation type {:?}, keeping user token", elevation);
        return None;
    }

    let mut linked = TOKEN_LINKED_TOKEN::default();
    let mut returned = 0u32;
    let result = unsafe {
        GetTokenInformation(
            token.raw(),
            TokenLinkedToken,
            Some(&mut linked as *mut TOKEN_LINKED_TOKEN as *mut c_void),
            std::mem::size_of::<TOKEN_LINKED_TOKEN>() as u32,
            &mut returned,
        )
    };
    match result {
        Ok(()) => Some(HandleGuard::new(linked.LinkedToken)),
        Err(e) => {
            debug!("No linked token: {}", e);
            None
        }
    }
}
