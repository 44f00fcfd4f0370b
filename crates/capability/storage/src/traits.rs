//! 仓储接口 Trait 定义
//!
//! - NodeStore：节点、点与派生状态
//! - CommandStore：节点命令（与节点 pending 标志同事务维护）
//! - RuleStore：规则（与节点 rules 反向引用同事务维护）
//! - UserStore / GroupStore：身份与可见性
//!
//! 所有接口返回 StorageError，使用 async_trait 支持动态分发。

use crate::error::StorageError;
use async_trait::async_trait;
use domain::{Command, Group, Node, NodeState, Point, Rule, RuleConfig, RuleState, SwUpdateState, User};
use uuid::Uuid;

/// 节点存储接口
#[async_trait]
pub trait NodeStore: Send + Sync {
    async fn node(&self, id: &str) -> Result<Node, StorageError>;

    async fn nodes(&self) -> Result<Vec<Node>, StorageError>;

    /// 直接子节点（不递归）。
    async fn node_children(&self, id: &str) -> Result<Vec<Node>, StorageError>;

    /// 删除节点，并级联删除其引用的全部规则。
    async fn delete_node(&self, id: &str) -> Result<(), StorageError>;

    async fn set_node_groups(&self, id: &str, groups: Vec<Uuid>) -> Result<(), StorageError>;

    /// 合并单个点；节点不存在时以该 ID 新建。
    async fn apply_point(&self, id: &str, point: Point) -> Result<(), StorageError>;

    /// 在同一事务中合并一批点。
    async fn apply_points(&self, id: &str, points: Vec<Point>) -> Result<(), StorageError>;

    async fn set_node_state(&self, id: &str, state: NodeState) -> Result<(), StorageError>;

    async fn set_node_sw_update_state(
        &self,
        id: &str,
        state: SwUpdateState,
    ) -> Result<(), StorageError>;
}

/// 命令存储接口
#[async_trait]
pub trait CommandStore: Send + Sync {
    /// 写入命令并置位目标节点的 pending 标志。
    async fn set_command(&self, command: Command) -> Result<(), StorageError>;

    /// 丢弃命令并清除 pending 标志；命令不存在时返回 NotFound。
    async fn clear_command(&self, id: &str) -> Result<(), StorageError>;

    /// 取走命令：非空命令被删除且 pending 清除；无命令时返回空命令。
    async fn take_command(&self, id: &str) -> Result<Command, StorageError>;

    async fn commands(&self) -> Result<Vec<Command>, StorageError>;
}

/// 规则存储接口
#[async_trait]
pub trait RuleStore: Send + Sync {
    async fn rules(&self) -> Result<Vec<Rule>, StorageError>;

    async fn rule(&self, id: Uuid) -> Result<Rule, StorageError>;

    /// 分配新 ID 并插入规则，同时追加到目标节点的 rules。
    async fn insert_rule(&self, rule: Rule) -> Result<Uuid, StorageError>;

    async fn update_rule_config(&self, id: Uuid, config: RuleConfig) -> Result<(), StorageError>;

    async fn update_rule_state(&self, id: Uuid, state: RuleState) -> Result<(), StorageError>;

    async fn delete_rule(&self, id: Uuid) -> Result<(), StorageError>;
}

/// 用户存储接口
#[async_trait]
pub trait UserStore: Send + Sync {
    /// 按名字（忽略大小写）升序排列的全部用户。
    async fn users(&self) -> Result<Vec<User>, StorageError>;

    async fn user(&self, id: Uuid) -> Result<User, StorageError>;

    async fn user_by_email(&self, email: &str) -> Result<User, StorageError>;

    /// 邮箱 + 口令精确匹配；无匹配时返回 `None`。
    async fn authenticate(&self, email: &str, pass: &str) -> Result<Option<User>, StorageError>;

    async fn insert_user(&self, user: User) -> Result<Uuid, StorageError>;

    async fn update_user(&self, user: User) -> Result<(), StorageError>;

    async fn delete_user(&self, id: Uuid) -> Result<(), StorageError>;
}

/// 分组存储接口
#[async_trait]
pub trait GroupStore: Send + Sync {
    async fn groups(&self) -> Result<Vec<Group>, StorageError>;

    async fn group(&self, id: Uuid) -> Result<Group, StorageError>;

    async fn insert_group(&self, group: Group) -> Result<Uuid, StorageError>;

    async fn update_group(&self, group: Group) -> Result<(), StorageError>;

    async fn delete_group(&self, id: Uuid) -> Result<(), StorageError>;

    async fn users_for_group(&self, id: Uuid) -> Result<Vec<User>, StorageError>;

    /// 是否为根分组成员。
    async fn is_root(&self, user_id: Uuid) -> Result<bool, StorageError>;

    /// 用户可见的节点：根用户可见全部，否则为与其分组有交集的节点。
    async fn nodes_for_user(&self, user_id: Uuid) -> Result<Vec<Node>, StorageError>;

    async fn nodes_for_group(&self, group_id: Uuid) -> Result<Vec<Node>, StorageError>;

    /// 幂等初始化根分组与 admin 用户。
    async fn initialize(&self) -> Result<(), StorageError>;
}
