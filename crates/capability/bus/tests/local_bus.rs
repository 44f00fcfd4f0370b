use async_trait::async_trait;
use domain::{Node, Point, POINT_TYPE_PARENT};
use fleet_bus::{
    BusError, BusHandler, LocalBus, MessageBus, NodeService, get_node, get_node_children,
    send_points,
};
use fleet_storage::{NodeRepository, NodeStore, Store};
use std::sync::Arc;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);

fn bus_over_store() -> (Arc<NodeRepository>, LocalBus) {
    let store = Arc::new(Store::temporary().expect("store"));
    let nodes = Arc::new(NodeRepository::new(store));
    let bus = LocalBus::new(Arc::new(NodeService::new(nodes.clone())));
    (nodes, bus)
}

#[tokio::test]
async fn get_node_and_children_over_bus() {
    let (nodes, bus) = bus_over_store();
    nodes.apply_point("root", Point::new("temp", 1.0)).await.expect("root");
    for child in ["a", "b"] {
        nodes
            .apply_point(child, Point::text(POINT_TYPE_PARENT, "root"))
            .await
            .expect("child");
    }
    nodes
        .apply_point("a-1", Point::text(POINT_TYPE_PARENT, "a"))
        .await
        .expect("grandchild");

    let root: Node = get_node(&bus, "root", TIMEOUT).await.expect("root");
    assert_eq!(root.points.len(), 1);

    let mut children: Vec<String> = get_node_children(&bus, "root", TIMEOUT)
        .await
        .expect("children")
        .into_iter()
        .map(|n| n.id)
        .collect();
    children.sort();
    assert_eq!(children, vec!["a", "b"]);
    assert!(
        get_node_children(&bus, "b", TIMEOUT)
            .await
            .expect("leaf")
            .is_empty()
    );
}

#[tokio::test]
async fn send_points_applies_with_and_without_ack() {
    let (nodes, bus) = bus_over_store();
    send_points(&bus, "dev-1", vec![Point::new("temp", 2.0)], true, TIMEOUT)
        .await
        .expect("ack send");
    send_points(&bus, "dev-1", vec![Point::new("hum", 40.0)], false, TIMEOUT)
        .await
        .expect("fire and forget");

    let node = nodes.node("dev-1").await.expect("node");
    assert_eq!(node.point("temp", "").expect("temp").value, 2.0);
    assert_eq!(node.point("hum", "").expect("hum").value, 40.0);
}

#[tokio::test]
async fn missing_node_surfaces_storage_error() {
    let (_, bus) = bus_over_store();
    let err = get_node(&bus, "ghost", TIMEOUT).await.expect_err("missing");
    assert!(matches!(err, BusError::Storage(ref inner) if inner.is_not_found()));
}

#[tokio::test]
async fn unknown_subject_has_no_responder() {
    let (_, bus) = bus_over_store();
    let err = bus
        .request("device.abc", Vec::new(), TIMEOUT)
        .await
        .expect_err("no responder");
    assert!(matches!(err, BusError::NoResponder { .. }));
}

struct Stalled;

#[async_trait]
impl BusHandler for Stalled {
    async fn handle(&self, _subject: &str, _payload: &[u8]) -> Result<Vec<u8>, BusError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn slow_responder_times_out() {
    let bus = LocalBus::new(Arc::new(Stalled));
    let err = get_node(&bus, "dev-1", Duration::from_millis(20))
        .await
        .expect_err("timeout");
    assert!(err.is_timeout());
}

#[tokio::test]
async fn unstamped_points_get_send_time() {
    let (nodes, bus) = bus_over_store();
    send_points(
        &bus,
        "dev-1",
        vec![Point::new("temp", 1.0), Point::new("hum", 2.0).with_ts_ms(7)],
        true,
        TIMEOUT,
    )
    .await
    .expect("send");

    let node = nodes.node("dev-1").await.expect("node");
    assert!(node.point("temp", "").expect("temp").ts_ms > 0);
    assert_eq!(node.point("hum", "").expect("hum").ts_ms, 7);
}

#[tokio::test]
async fn forwarded_points_keep_missing_timestamps() {
    let (nodes, bus) = bus_over_store();
    fleet_bus::forward_points(&bus, "dev-1", vec![Point::new("temp", 1.0)], true, TIMEOUT)
        .await
        .expect("forward");
    assert_eq!(
        nodes
            .node("dev-1")
            .await
            .expect("node")
            .point("temp", "")
            .expect("temp")
            .ts_ms,
        0
    );
}
