// UTF-16 → UTF-8 转码
//
// 一条消息可能被拆成多次读取，代理对可能正好跨在两次读取之间。

/// 按块转码的 UTF-16 中继
#[derive(Debug, Default)]
pub struct Utf16Relay {
    /// 上一块末尾尚未配对的高位代理
    pending: Option<u16>,
    bytes: Vec<u8>,
}

fn is_high_surrogate(unit: u16) -> bool {
    (0xD800..=0xDBFF).contains(&unit)
}

impl Utf16Relay {
    pub fn new() -> Self {
        Self::default()
    }

    /// 转码一块 UTF-16，返回本块可以立即输出的 UTF-8 字节
    pub fn push(&mut self, units: &[u16]) -> &[u8] {
        self.bytes.clear();
        if units.is_empty() {
            return &self.bytes;
        }

        let (body, tail) = match units.split_last() {
            Some((&last, body)) if is_high_surrogate(last) => (body, Some(last)),
            _ => (units, None),
        };

        let head = self.pending.take();
        for decoded in char::decode_utf16(head.into_iter().chain(body.iter().copied())) {
            let c = decoded.unwrap_or(char::REPLACEMENT_CHARACTER);
            let mut utf8 = [0u8; 4];
            self.bytes.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
        }
        self.pending = tail;

        &self.bytes
    }

    /// 消息结束：未配对的高位代理输出为 U+FFFD
    pub fn finish(&mut self) -> &[u8] {
        self.bytes.clear();
        if self.pending.take().is_some() {
            let mut utf8 = [0u8; 4];
            self.bytes
                .extend_from_slice(char::REPLACEMENT_CHARACTER.encode_utf8(&mut utf8).as_bytes());
        }
        &self.bytes
    }
}
