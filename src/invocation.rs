// 命令行解析
//
// 命令行不按 argv 拆分：程序名之后的原始字符串整体就是命令。

use crate::core::CommandRequest;

/// 一次启动要做的事
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// 空命令行或无法识别的开关，直接以 0 退出
    Nothing,
    /// `/e`：通过计划任务以管理员身份启动目标，失败则普通启动
    Elevate(String),
    /// `/s`：由计划任务以 SYSTEM 身份调用，在交互会话中启动目标
    SessionLaunch(String),
    Command(CommandRequest),
}

impl Invocation {
    pub fn parse(raw: &str) -> Self {
        if raw.is_empty() {
            return Self::Nothing;
        }

        let Some(switch) = raw.strip_prefix('/') else {
            return Self::Command(CommandRequest::parse(raw));
        };

        let mut chars = switch.chars();
        let Some(letter) = chars.next() else {
            return Self::Nothing;
        };

        // 开关只能是单个字母，后面是结尾或一个空白分隔符
        let rest = chars.as_str();
        let args = match rest.chars().next() {
            None => "",
            Some(c) if c <= ' ' => &rest[c.len_utf8()..],
            Some(_) => return Self::Nothing,
        };

        match letter {
            'e' => Self::Elevate(args.to_string()),
            's' => Self::SessionLaunch(args.to_string()),
            _ => Self::Nothing,
        }
    }
}

/// 去掉命令行开头的程序名，规则与 WinMain 的 lpCmdLine 相同
pub fn strip_program_name(command_line: &str) -> &str {
    let rest = if let Some(quoted) = command_line.strip_prefix('"') {
        match quoted.find('"') {
            Some(end) => &quoted[end + 1..],
            None => "",
        }
    } else {
        match command_line.find(|c: char| c == ' ' || c == '\t') {
            Some(end) => &command_line[end..],
            None => "",
        }
    };

    rest.trim_start_matches([' ', '\t'])
}

/// 当前进程的原始命令行（不含程序名）
#[cfg(target_os = "windows")]
pub fn raw_command_line() -> String {
    use windows::Win32::System::Environment::GetCommandLineW;

    let full = unsafe { GetCommandLineW().to_string() }.unwrap_or_default();
    strip_program_name(&full).to_string()
}

#[cfg(not(target_os = "windows"))]
pub fn raw_command_line() -> String {
    std::env::args().skip(1).collect::<Vec<_>>().join(" ")
}
