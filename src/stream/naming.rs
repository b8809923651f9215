// 结果管道命名

use std::fmt;

/// 每次调用独占的结果管道名：`<前缀><实例 ID>`
///
/// 实例 ID 取调用线程的系统线程 ID，同一主机上并发运行的多个启动器不会重名。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipeName(String);

impl PipeName {
    pub fn new(prefix: &str, instance_id: u32) -> Self {
        Self(format!("{}{}", prefix, instance_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PipeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PipeName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
