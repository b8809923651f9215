// UTF-16 字符串辅助函数

/// 以 NUL 结尾的 UTF-16 字符串，用于传给 Win32 API
pub fn to_wide_null(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// 不带结尾 NUL 的 UTF-16 编码
pub fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().collect()
}
