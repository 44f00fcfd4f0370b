//! 子树复制：把源端的一个节点及其全部后代经消息总线复制到目的端。
//!
//! 目的端只接收点流：每个节点的原有点之外附加节点类型点与父节点点，
//! 由目的端的合并引擎重建树形与类型。
//!
//! 遍历使用显式工作栈（深度优先，子节点按源端返回顺序）。父节点的点
//! 以需应答方式写入目的端之后，才会取其子节点，因此目的端不会先于父节点
//! 看到子节点。复制为至少一次语义：出错时已写入的节点保留，不回滚。
//!
//! 点按源端存储原样发送（不补时间戳）。父指针成环时，已复制的节点不再重复
//! 访问。

use domain::Node;
use fleet_bus::{BusError, MessageBus, forward_points, get_node, get_node_children};
use fleet_telemetry::{record_node_replicated, record_replication_failure};
use std::collections::HashSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 复制错误，携带出错的节点 ID。
#[derive(Debug, thiserror::Error)]
pub enum ReplicationError {
    #[error("error getting source node {node_id}: {source}")]
    FetchNode {
        node_id: String,
        #[source]
        source: BusError,
    },
    #[error("error sending node {node_id} to destination: {source}")]
    SendPoints {
        node_id: String,
        #[source]
        source: BusError,
    },
    #[error("error getting children of node {node_id}: {source}")]
    FetchChildren {
        node_id: String,
        #[source]
        source: BusError,
    },
    #[error("replication cancelled before node {node_id}")]
    Cancelled { node_id: String },
}

impl ReplicationError {
    pub fn node_id(&self) -> &str {
        match self {
            Self::FetchNode { node_id, .. }
            | Self::SendPoints { node_id, .. }
            | Self::FetchChildren { node_id, .. }
            | Self::Cancelled { node_id } => node_id,
        }
    }
}

/// 单次复制的结果。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplicationReport {
    /// 已写入目的端的节点数。
    pub nodes: usize,
}

pub struct Replicator {
    timeout: Duration,
}

impl Default for Replicator {
    fn default() -> Self {
        Self::new(fleet_bus::DEFAULT_REQUEST_TIMEOUT)
    }
}

impl Replicator {
    /// `timeout` 作用于每一次总线请求。
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// 复制 `node_id` 为根的子树；`parent_id` 为空表示不附加父节点点。
    ///
    /// 首个失败立即终止剩余遍历；`cancel` 在处理每个节点之前检查。
    pub async fn replicate_subtree(
        &self,
        src: &dyn MessageBus,
        dest: &dyn MessageBus,
        node_id: &str,
        parent_id: &str,
        cancel: &CancellationToken,
    ) -> Result<ReplicationReport, ReplicationError> {
        let result = self.walk(src, dest, node_id, parent_id, cancel).await;
        match &result {
            Ok(report) => info!(
                target: "fleet.replication",
                node_id = %node_id,
                nodes = report.nodes,
                "subtree replicated"
            ),
            Err(err) => {
                record_replication_failure();
                warn!(
                    target: "fleet.replication",
                    node_id = %node_id,
                    failed_node = %err.node_id(),
                    "subtree replication failed: {}", err
                );
            }
        }
        result
    }

    async fn walk(
        &self,
        src: &dyn MessageBus,
        dest: &dyn MessageBus,
        node_id: &str,
        parent_id: &str,
        cancel: &CancellationToken,
    ) -> Result<ReplicationReport, ReplicationError> {
        let mut report = ReplicationReport::default();
        let mut pending = vec![(node_id.to_string(), parent_id.to_string())];
        let mut visited = HashSet::new();

        while let Some((id, parent)) = pending.pop() {
            if cancel.is_cancelled() {
                return Err(ReplicationError::Cancelled { node_id: id });
            }
            if !visited.insert(id.clone()) {
                warn!(
                    target: "fleet.replication",
                    node_id = %id,
                    parent = %parent,
                    "node already replicated in this run, parent cycle skipped"
                );
                continue;
            }

            let node = get_node(src, &id, self.timeout)
                .await
                .map_err(|source| ReplicationError::FetchNode {
                    node_id: id.clone(),
                    source,
                })?;
            self.send_node(dest, &node, &parent).await?;
            report.nodes += 1;
            record_node_replicated();
            debug!(target: "fleet.replication", node_id = %id, parent = %parent, "node replicated");

            let children = get_node_children(src, &id, self.timeout)
                .await
                .map_err(|source| ReplicationError::FetchChildren {
                    node_id: id.clone(),
                    source,
                })?;
            // 逆序入栈，使出栈顺序与源端子节点顺序一致
            for child in children.into_iter().rev() {
                pending.push((child.id, id.clone()));
            }
        }
        Ok(report)
    }

    async fn send_node(
        &self,
        dest: &dyn MessageBus,
        node: &Node,
        parent_id: &str,
    ) -> Result<(), ReplicationError> {
        forward_points(
            dest,
            &node.id,
            node.replication_points(parent_id),
            true,
            self.timeout,
        )
        .await
        .map_err(|source| ReplicationError::SendPoints {
            node_id: node.id.clone(),
            source,
        })
    }
}
