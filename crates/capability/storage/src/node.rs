//! 节点仓储：节点 / 点 / 命令 / 规则
//!
//! 跨记录不变量全部在单个事务内维护：
//! - 命令记录存在 ⇔ 节点 `cmd_pending` 为 true（Command + Node）
//! - 节点 `rules` ⇔ `config.node_id` 指向该节点的规则集合（Rule + Node）
//! - 删除节点级联删除其规则与待处理命令（Node + Rule* + Command）
//!
//! sled 调用是同步阻塞的，全部经由 [`Store::run_blocking`] 在阻塞线程池上执行。

use crate::error::StorageError;
use crate::store::{Store, StoreTx};
use crate::timeseries::{NoopSink, TimeSeriesSink};
use crate::traits::{CommandStore, NodeStore, RuleStore};
use async_trait::async_trait;
use domain::{Command, Node, NodeState, Point, Rule, RuleConfig, RuleState, SwUpdateState};
use fleet_telemetry::{
    record_command_cleared, record_command_set, record_command_taken, record_points_applied,
    record_sink_write_failure,
};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// 节点仓储
pub struct NodeRepository {
    store: Arc<Store>,
    sink: Arc<dyn TimeSeriesSink>,
}

impl NodeRepository {
    pub fn new(store: Arc<Store>) -> Self {
        Self::with_sink(store, Arc::new(NoopSink))
    }

    pub fn with_sink(store: Arc<Store>, sink: Arc<dyn TimeSeriesSink>) -> Self {
        Self { store, sink }
    }

    /// 遍历全部节点，回调首次出错即停止。
    pub fn for_each_node<F>(&self, callback: F) -> Result<(), StorageError>
    where
        F: FnMut(Node) -> Result<(), StorageError>,
    {
        self.store.for_each(callback)
    }

    /// 遍历全部规则，回调首次出错即停止。
    pub fn for_each_rule<F>(&self, callback: F) -> Result<(), StorageError>
    where
        F: FnMut(Rule) -> Result<(), StorageError>,
    {
        self.store.for_each(callback)
    }

    /// upsert-on-missing 的读-改-写：节点不存在时以 `id` 新建。
    async fn modify_or_create<F>(&self, id: &str, modify: F) -> Result<(), StorageError>
    where
        F: Fn(&mut Node) + Send + 'static,
    {
        let id = id.to_string();
        self.store
            .run_blocking(move |store| {
                store.transaction(|tx| {
                    let mut node = load_or_new(tx, &id)?;
                    modify(&mut node);
                    tx.upsert(id.as_str(), &node)
                })
            })
            .await
    }

    async fn forward_to_sink(&self, id: &str, points: &[Point]) {
        for point in points.iter().filter(|p| !p.is_metadata()) {
            if let Err(err) = self.sink.write(id, point).await {
                record_sink_write_failure();
                warn!(
                    target: "fleet.storage",
                    node_id = %id,
                    point_type = %point.point_type,
                    "time-series write failed: {}", err
                );
            }
        }
    }
}

fn load_or_new(tx: &StoreTx<'_>, id: &str) -> Result<Node, StorageError> {
    Ok(tx.try_get::<Node, _>(id)?.unwrap_or_else(|| Node::new(id)))
}

/// 置位/清除节点 pending 标志；节点必须存在。
fn set_pending(tx: &StoreTx<'_>, id: &str, pending: bool) -> Result<(), StorageError> {
    let mut node: Node = tx.get(id)?;
    node.set_cmd_pending(pending);
    tx.update(id, &node)
}

/// 非有限数值无法编码，整批拒绝。
fn validate_points(id: &str, points: &[Point]) -> Result<(), StorageError> {
    match points.iter().find(|p| !p.is_finite()) {
        Some(point) => Err(StorageError::InvalidPoint {
            node_id: id.to_string(),
            point_type: point.point_type.clone(),
        }),
        None => Ok(()),
    }
}

#[async_trait]
impl NodeStore for NodeRepository {
    async fn node(&self, id: &str) -> Result<Node, StorageError> {
        let id = id.to_string();
        self.store.run_blocking(move |store| store.get(&id)).await
    }

    async fn nodes(&self) -> Result<Vec<Node>, StorageError> {
        self.store.run_blocking(|store| store.all()).await
    }

    async fn node_children(&self, id: &str) -> Result<Vec<Node>, StorageError> {
        let id = id.to_string();
        self.store
            .run_blocking(move |store| store.find(|node: &Node| node.parent == id))
            .await
    }

    async fn delete_node(&self, id: &str) -> Result<(), StorageError> {
        let id = id.to_string();
        self.store
            .run_blocking(move |store| {
                store.transaction(|tx| {
                    let node: Node = tx.get(id.as_str())?;
                    for rule_id in &node.rules {
                        tx.delete::<Rule, _>(rule_id)?;
                    }
                    if tx.contains::<Command, _>(id.as_str())? {
                        tx.delete::<Command, _>(id.as_str())?;
                    }
                    tx.delete::<Node, _>(id.as_str())
                })
            })
            .await
    }

    async fn set_node_groups(&self, id: &str, groups: Vec<Uuid>) -> Result<(), StorageError> {
        let id = id.to_string();
        self.store
            .run_blocking(move |store| {
                store.transaction(|tx| {
                    let mut node: Node = tx.get(id.as_str())?;
                    node.groups = groups.clone();
                    tx.update(id.as_str(), &node)
                })
            })
            .await
    }

    async fn apply_point(&self, id: &str, point: Point) -> Result<(), StorageError> {
        self.apply_points(id, vec![point]).await
    }

    async fn apply_points(&self, id: &str, points: Vec<Point>) -> Result<(), StorageError> {
        validate_points(id, &points)?;
        let merged = points.clone();
        self.modify_or_create(id, move |node| {
            node.process_points(merged.iter().cloned());
            node.set_state(NodeState::Online);
        })
        .await?;
        record_points_applied(points.len() as u64);
        self.forward_to_sink(id, &points).await;
        Ok(())
    }

    async fn set_node_state(&self, id: &str, state: NodeState) -> Result<(), StorageError> {
        self.modify_or_create(id, move |node| node.set_state(state))
            .await
    }

    async fn set_node_sw_update_state(
        &self,
        id: &str,
        state: SwUpdateState,
    ) -> Result<(), StorageError> {
        self.modify_or_create(id, move |node| node.set_sw_update_state(state.clone()))
            .await
    }
}

#[async_trait]
impl CommandStore for NodeRepository {
    async fn set_command(&self, command: Command) -> Result<(), StorageError> {
        self.store
            .run_blocking(move |store| {
                store.transaction(|tx| {
                    tx.upsert(command.id.as_str(), &command)?;
                    set_pending(tx, &command.id, true)
                })
            })
            .await?;
        record_command_set();
        Ok(())
    }

    async fn clear_command(&self, id: &str) -> Result<(), StorageError> {
        let id = id.to_string();
        self.store
            .run_blocking(move |store| {
                store.transaction(|tx| {
                    tx.delete::<Command, _>(id.as_str())?;
                    set_pending(tx, &id, false)
                })
            })
            .await?;
        record_command_cleared();
        Ok(())
    }

    async fn take_command(&self, id: &str) -> Result<Command, StorageError> {
        let id = id.to_string();
        let command = self
            .store
            .run_blocking(move |store| {
                store.transaction(|tx| {
                    let command = tx
                        .try_get::<Command, _>(id.as_str())?
                        .unwrap_or_else(|| Command::new(id.as_str(), ""));
                    if !command.is_empty() {
                        tx.delete::<Command, _>(id.as_str())?;
                        set_pending(tx, &id, false)?;
                    }
                    Ok(command)
                })
            })
            .await?;
        if !command.is_empty() {
            record_command_taken();
        }
        Ok(command)
    }

    async fn commands(&self) -> Result<Vec<Command>, StorageError> {
        self.store.run_blocking(|store| store.all()).await
    }
}

#[async_trait]
impl RuleStore for NodeRepository {
    async fn rules(&self) -> Result<Vec<Rule>, StorageError> {
        self.store.run_blocking(|store| store.all()).await
    }

    async fn rule(&self, id: Uuid) -> Result<Rule, StorageError> {
        self.store.run_blocking(move |store| store.get(&id)).await
    }

    async fn insert_rule(&self, rule: Rule) -> Result<Uuid, StorageError> {
        let rule = Rule {
            id: Uuid::new_v4(),
            ..rule
        };
        self.store
            .run_blocking(move |store| {
                store.transaction(|tx| {
                    tx.insert(&rule.id, &rule)?;
                    let node_id = rule.config.node_id.as_str();
                    let mut node: Node = tx.get(node_id)?;
                    node.rules.push(rule.id);
                    tx.update(node_id, &node)?;
                    Ok(rule.id)
                })
            })
            .await
    }

    /// 目标节点变化时，同一事务内把规则 ID 从原节点移到新节点；新节点须存在。
    async fn update_rule_config(&self, id: Uuid, config: RuleConfig) -> Result<(), StorageError> {
        self.store
            .run_blocking(move |store| {
                store.transaction(|tx| {
                    let mut rule: Rule = tx.get(&id)?;
                    let previous = rule.config.node_id.clone();
                    let target = config.node_id.as_str();
                    if previous != target {
                        let mut to: Node = tx.get(target)?;
                        if let Some(mut from) = tx.try_get::<Node, _>(previous.as_str())? {
                            from.rules.retain(|rule_id| *rule_id != id);
                            tx.update(previous.as_str(), &from)?;
                        }
                        if !to.rules.contains(&id) {
                            to.rules.push(id);
                        }
                        tx.update(target, &to)?;
                    }
                    rule.config = config.clone();
                    tx.update(&id, &rule)
                })
            })
            .await
    }

    async fn update_rule_state(&self, id: Uuid, state: RuleState) -> Result<(), StorageError> {
        self.store
            .run_blocking(move |store| {
                store.transaction(|tx| {
                    let mut rule: Rule = tx.get(&id)?;
                    rule.state = state.clone();
                    tx.update(&id, &rule)
                })
            })
            .await
    }

    /// 删除规则，并从所属节点的 `rules` 中移除该 ID。
    async fn delete_rule(&self, id: Uuid) -> Result<(), StorageError> {
        self.store
            .run_blocking(move |store| {
                store.transaction(|tx| {
                    let rule: Rule = tx.get(&id)?;
                    let node_id = rule.config.node_id.as_str();
                    let mut node: Node = tx.get(node_id)?;
                    node.rules.retain(|rule_id| *rule_id != id);
                    tx.update(node_id, &node)?;
                    tx.delete::<Rule, _>(&id)
                })
            })
            .await
    }
}
