use async_trait::async_trait;
use domain::{Point, POINT_TYPE_NODE_TYPE, POINT_TYPE_PARENT};
use fleet_bus::{BusError, LocalBus, MessageBus, NodeService};
use fleet_replication::{ReplicationError, Replicator};
use fleet_storage::{NodeRepository, NodeStore, Store};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn side() -> (Arc<NodeRepository>, LocalBus) {
    let store = Arc::new(Store::temporary().expect("store"));
    let nodes = Arc::new(NodeRepository::new(store));
    let bus = LocalBus::new(Arc::new(NodeService::new(nodes.clone())));
    (nodes, bus)
}

async fn seed(nodes: &NodeRepository, id: &str, node_type: &str, parent: &str, value: f64) {
    let mut points = vec![
        Point::text(POINT_TYPE_NODE_TYPE, node_type),
        Point::new("temp", value).with_ts_ms(1_000),
        Point::new("temp", value + 0.5).with_key("aux").with_ts_ms(1_500),
        Point::text("description", format!("{node_type} {id}")),
    ];
    if !parent.is_empty() {
        points.push(Point::text(POINT_TYPE_PARENT, parent));
    }
    nodes.apply_points(id, points).await.expect("seed");
}

async fn seed_tree(nodes: &NodeRepository) {
    seed(nodes, "root", "device", "", 1.0).await;
    seed(nodes, "a", "group", "root", 2.0).await;
    seed(nodes, "b", "modbus", "root", 3.0).await;
    seed(nodes, "a-1", "sensor", "a", 4.0).await;
}

#[tokio::test]
async fn subtree_is_reconstructed_at_destination() {
    let (src_nodes, src) = side();
    let (dest_nodes, dest) = side();
    seed_tree(&src_nodes).await;

    let report = Replicator::new(Duration::from_secs(5))
        .replicate_subtree(&src, &dest, "root", "", &CancellationToken::new())
        .await
        .expect("replicate");
    assert_eq!(report.nodes, 4);
    let unstamped = dest_nodes.node("root").await.expect("root");
    assert_eq!(unstamped.point("description", "").expect("description").ts_ms, 0);

    for id in ["root", "a", "b", "a-1"] {
        let source_node = src_nodes.node(id).await.expect("src");
        let copy = dest_nodes.node(id).await.expect("dest");
        assert_eq!(copy.node_type, source_node.node_type, "{id}");
        assert_eq!(copy.parent, source_node.parent, "{id}");
        assert_eq!(copy.points, source_node.points, "{id}");
    }

    let mut children: Vec<String> = dest_nodes
        .node_children("root")
        .await
        .expect("children")
        .into_iter()
        .map(|n| n.id)
        .collect();
    children.sort();
    assert_eq!(children, vec!["a", "b"]);
}

#[tokio::test]
async fn replication_is_idempotent() {
    let (src_nodes, src) = side();
    let (dest_nodes, dest) = side();
    seed_tree(&src_nodes).await;
    let replicator = Replicator::default();
    let cancel = CancellationToken::new();

    replicator
        .replicate_subtree(&src, &dest, "a", "root", &cancel)
        .await
        .expect("first");
    let first = dest_nodes.node("a").await.expect("a");
    replicator
        .replicate_subtree(&src, &dest, "a", "root", &cancel)
        .await
        .expect("second");

    assert_eq!(dest_nodes.node("a").await.expect("a"), first);
    assert_eq!(dest_nodes.nodes().await.expect("all").len(), 2);
    assert_eq!(first.parent, "root");
}

#[tokio::test]
async fn missing_source_node_is_fatal() {
    let (_, src) = side();
    let (dest_nodes, dest) = side();

    let err = Replicator::default()
        .replicate_subtree(&src, &dest, "ghost", "", &CancellationToken::new())
        .await
        .expect_err("missing");
    assert!(matches!(err, ReplicationError::FetchNode { ref node_id, .. } if node_id == "ghost"));
    assert!(dest_nodes.nodes().await.expect("nodes").is_empty());
}

#[tokio::test]
async fn cancelled_token_stops_before_first_node() {
    let (src_nodes, src) = side();
    let (dest_nodes, dest) = side();
    seed_tree(&src_nodes).await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = Replicator::default()
        .replicate_subtree(&src, &dest, "root", "", &cancel)
        .await
        .expect_err("cancelled");
    assert!(matches!(err, ReplicationError::Cancelled { .. }));
    assert!(dest_nodes.nodes().await.expect("nodes").is_empty());
}

/// 第一次写入成功后取消令牌的目的端。
struct CancelAfterFirstSend {
    inner: LocalBus,
    cancel: CancellationToken,
}

#[async_trait]
impl MessageBus for CancelAfterFirstSend {
    async fn request(
        &self,
        subject: &str,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> Result<Vec<u8>, BusError> {
        let reply = self.inner.request(subject, payload, timeout).await?;
        self.cancel.cancel();
        Ok(reply)
    }

    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), BusError> {
        self.inner.publish(subject, payload).await
    }
}

#[tokio::test]
async fn cancellation_between_nodes_keeps_applied_parent() {
    let (src_nodes, src) = side();
    let (dest_nodes, dest) = side();
    seed_tree(&src_nodes).await;
    let cancel = CancellationToken::new();
    let dest = CancelAfterFirstSend {
        inner: dest,
        cancel: cancel.clone(),
    };

    let err = Replicator::default()
        .replicate_subtree(&src, &dest, "root", "", &cancel)
        .await
        .expect_err("cancelled");
    assert_eq!(err.node_id(), "a");

    let applied = dest_nodes.nodes().await.expect("nodes");
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].id, "root");
}

struct FailingDestination;

#[async_trait]
impl MessageBus for FailingDestination {
    async fn request(
        &self,
        subject: &str,
        _payload: Vec<u8>,
        _timeout: Duration,
    ) -> Result<Vec<u8>, BusError> {
        Err(BusError::Timeout {
            subject: subject.to_string(),
        })
    }

    async fn publish(&self, _subject: &str, _payload: Vec<u8>) -> Result<(), BusError> {
        Ok(())
    }
}

#[tokio::test]
async fn destination_timeout_is_reported_with_node() {
    let (src_nodes, src) = side();
    seed_tree(&src_nodes).await;

    let err = Replicator::default()
        .replicate_subtree(&src, &FailingDestination, "root", "", &CancellationToken::new())
        .await
        .expect_err("timeout");
    match err {
        ReplicationError::SendPoints { node_id, source } => {
            assert_eq!(node_id, "root");
            assert!(source.is_timeout());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn parent_cycle_is_visited_once() {
    let (src_nodes, src) = side();
    let (dest_nodes, dest) = side();
    seed(&src_nodes, "a", "group", "b", 1.0).await;
    seed(&src_nodes, "b", "group", "a", 2.0).await;

    let report = tokio::time::timeout(
        Duration::from_secs(5),
        Replicator::default().replicate_subtree(&src, &dest, "a", "", &CancellationToken::new()),
    )
    .await
    .expect("finishes")
    .expect("replicate");

    assert_eq!(report.nodes, 2);
    assert_eq!(dest_nodes.node("b").await.expect("b").parent, "a");
    assert_eq!(dest_nodes.node("a").await.expect("a").parent, "");
}
