// 命令通道：把命令文本通过一次同步的跨进程消息交给目标

use tracing::info;

use crate::core::{Mode, TargetReply};
use crate::locator::ControlSurface;
use crate::stream::PipeName;
use crate::utils::wide::to_wide;

/// 一次发送给目标的数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPayload {
    mode: Mode,
    text: String,
}

impl CommandPayload {
    pub fn new(mode: Mode, text: impl Into<String>) -> Self {
        Self {
            mode,
            text: text.into(),
        }
    }

    /// 流式模式下把管道名放在命令前面，目标据此连接结果管道
    pub fn with_result_pipe(mode: Mode, pipe: &PipeName, text: &str) -> Self {
        Self::new(mode, format!("{} {}", pipe, text))
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// 消息正文：UTF-16，不含结尾 NUL
    pub fn to_utf16(&self) -> Vec<u16> {
        to_wide(&self.text)
    }
}

/// 向目标的控制窗口发送一条阻塞消息，返回目标处理函数的整数结果
pub trait CommandSender: ControlSurface {
    fn send_command(&self, window: Self::Window, payload: &CommandPayload) -> isize;
}

/// 发送命令并解码回复；不重试
pub fn send<S: CommandSender>(sender: &S, window: S::Window, payload: &CommandPayload) -> TargetReply {
    info!(
        "📨 Sending command to {:?} (mode {})",
        window,
        payload.mode().bits()
    );
    let raw = sender.send_command(window, payload);
    let reply = TargetReply::decode(raw);
    info!("Target replied {} -> {:?}", raw, reply);
    reply
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct RecordingSender {
        reply: isize,
        sent: RefCell<Vec<(u8, CommandPayload)>>,
    }

    impl ControlSurface for RecordingSender {
        type Window = u8;

        fn find_window(&self, _class_name: &str) -> Option<u8> {
            Some(1)
        }
    }

    impl CommandSender for RecordingSender {
        fn send_command(&self, window: u8, payload: &CommandPayload) -> isize {
            self.sent.borrow_mut().push((window, payload.clone()));
            self.reply
        }
    }

    #[test]
    fn test_payload_with_pipe_name() {
        let pipe = PipeName::new(r"\\.\pipe\cl-", 42);
        let payload = CommandPayload::with_result_pipe(Mode::WAIT_AND_STREAM, &pipe, "name foo");

        assert_eq!(payload.text(), r"\\.\pipe\cl-42 name foo");
        assert_eq!(payload.mode().bits(), 3);
        assert_eq!(payload.to_utf16().len(), payload.text().chars().count());
    }

    #[test]
    fn test_send_once_and_decode() {
        let sender = RecordingSender {
            reply: 1234,
            sent: RefCell::new(Vec::new()),
        };
        let payload = CommandPayload::new(Mode::WAIT, "script");

        let reply = send(&sender, 9, &payload);

        assert_eq!(reply, TargetReply::Dispatched { worker_pid: 1234 });
        assert_eq!(sender.sent.borrow().as_slice(), &[(9, payload)]);
    }
}
