//! 全库导出：五个集合写入单个 JSON 文档（缩进格式）。

use crate::error::StorageError;
use crate::identity::IdentityRepository;
use crate::node::NodeRepository;
use crate::traits::{CommandStore, GroupStore, NodeStore, RuleStore, UserStore};
use domain::{Command, Group, Node, Rule, User};
use serde::{Deserialize, Serialize};
use std::io::Write;

/// 导出文档。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreDump {
    pub nodes: Vec<Node>,
    pub users: Vec<User>,
    pub groups: Vec<Group>,
    pub rules: Vec<Rule>,
    pub commands: Vec<Command>,
}

/// 收集五个集合的全量数据。
pub async fn collect_dump(
    nodes: &NodeRepository,
    identity: &IdentityRepository,
) -> Result<StoreDump, StorageError> {
    Ok(StoreDump {
        nodes: nodes.nodes().await?,
        users: identity.users().await?,
        groups: identity.groups().await?,
        rules: nodes.rules().await?,
        commands: nodes.commands().await?,
    })
}

/// 导出全库到 `out`。
pub async fn dump<W: Write>(
    nodes: &NodeRepository,
    identity: &IdentityRepository,
    out: W,
) -> Result<(), StorageError> {
    let dump = collect_dump(nodes, identity).await?;
    serde_json::to_writer_pretty(out, &dump)?;
    Ok(())
}
