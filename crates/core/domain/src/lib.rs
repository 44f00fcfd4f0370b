//! 设备树领域模型。
//!
//! - `data`：节点（Node）与点（Point）
//! - `merge`：点合并引擎（纯函数，无 I/O）
//! - `command`：节点命令
//! - `rule`：规则配置与运行状态
//! - `identity`：用户、分组与根分组哨兵标识

pub mod command;
pub mod data;
pub mod identity;
pub mod merge;
pub mod rule;

pub use command::Command;
pub use data::{
    Node, NodeState, POINT_TYPE_NODE_TYPE, POINT_TYPE_PARENT, Point, SwUpdateState,
};
pub use identity::{Group, ROOT_GROUP_NAME, ROOT_ID, Role, User, UserRoles};
pub use rule::{Rule, RuleAction, RuleCondition, RuleConfig, RuleState};

/// 当前时间（毫秒）。
pub fn now_epoch_ms() -> i64 {
    let now = std::time::SystemTime::now();
    let duration = now
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    duration.as_millis() as i64
}
