//! 节点命令。

use serde::{Deserialize, Serialize};

/// 节点命令，按目标节点 ID 存储；设备轮询时至多消费一次。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    pub id: String,
    #[serde(default)]
    pub cmd: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub detail: String,
}

impl Command {
    pub fn new(id: impl Into<String>, cmd: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            cmd: cmd.into(),
            detail: String::new(),
        }
    }

    /// 空命令：无待下发内容。
    pub fn is_empty(&self) -> bool {
        self.cmd.is_empty()
    }
}
