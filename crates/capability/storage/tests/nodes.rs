use domain::{Node, NodeState, POINT_TYPE_PARENT, Point, SwUpdateState};
use fleet_storage::{InMemorySink, NodeRepository, NodeStore, Store};
use std::sync::Arc;
use uuid::Uuid;

fn repo() -> NodeRepository {
    NodeRepository::new(Arc::new(Store::temporary().expect("store")))
}

#[tokio::test]
async fn apply_point_creates_missing_node() {
    let nodes = repo();
    nodes
        .apply_point("dev-1", Point::new("temp", 20.0).with_ts_ms(1000))
        .await
        .expect("apply");

    let all = nodes.nodes().await.expect("nodes");
    assert_eq!(all.len(), 1);
    let node = &all[0];
    assert_eq!(node.id, "dev-1");
    assert_eq!(node.state, NodeState::Online);
    assert_eq!(node.points, vec![Point::new("temp", 20.0).with_ts_ms(1000)]);
}

#[tokio::test]
async fn later_point_replaces_same_identity_only() {
    let nodes = repo();
    nodes
        .apply_point("dev-1", Point::new("temp", 20.0).with_ts_ms(1000))
        .await
        .expect("apply");
    nodes
        .apply_point("dev-1", Point::new("volt", 3.3).with_key("V0").with_ts_ms(1000))
        .await
        .expect("apply");
    nodes
        .apply_point("dev-1", Point::new("temp", 25.0).with_ts_ms(2000))
        .await
        .expect("apply");

    let node = nodes.node("dev-1").await.expect("node");
    assert_eq!(node.id, "dev-1");
    assert_eq!(node.points.len(), 2);
    assert_eq!(node.point("temp", "").expect("temp").value, 25.0);
    assert_eq!(node.point("volt", "V0").expect("volt").value, 3.3);
}

#[tokio::test]
async fn sink_receives_points_and_failures_are_not_fatal() {
    let store = Arc::new(Store::temporary().expect("store"));
    let sink = Arc::new(InMemorySink::new());
    let nodes = NodeRepository::with_sink(store.clone(), sink.clone());
    nodes
        .apply_points(
            "dev-1",
            vec![Point::new("temp", 1.0), Point::text(POINT_TYPE_PARENT, "gw-1")],
        )
        .await
        .expect("apply");
    let samples = sink.samples();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].0, "dev-1");

    let failing = NodeRepository::with_sink(store, Arc::new(InMemorySink::failing()));
    failing
        .apply_point("dev-2", Point::new("temp", 2.0))
        .await
        .expect("apply despite sink failure");
    assert!(failing.node("dev-2").await.is_ok());
}

#[tokio::test]
async fn state_setters_upsert_missing_nodes() {
    let nodes = repo();
    nodes
        .set_node_state("dev-1", NodeState::Offline)
        .await
        .expect("state");
    let update = SwUpdateState {
        running: true,
        error: String::new(),
        percent_done: 40,
    };
    nodes
        .set_node_sw_update_state("dev-2", update.clone())
        .await
        .expect("sw state");

    assert_eq!(nodes.node("dev-1").await.expect("dev-1").state, NodeState::Offline);
    assert_eq!(nodes.node("dev-2").await.expect("dev-2").sw_update_state, update);
}

#[tokio::test]
async fn set_node_groups_requires_node() {
    let nodes = repo();
    let group = Uuid::new_v4();
    let err = nodes
        .set_node_groups("missing", vec![group])
        .await
        .expect_err("missing");
    assert!(err.is_not_found());

    nodes.apply_point("dev-1", Point::new("temp", 1.0)).await.expect("apply");
    nodes
        .set_node_groups("dev-1", vec![group])
        .await
        .expect("groups");
    assert_eq!(nodes.node("dev-1").await.expect("node").groups, vec![group]);
}

#[tokio::test]
async fn children_are_resolved_from_parent_points() {
    let nodes = repo();
    nodes
        .apply_point("gw-1", Point::new("uptime", 1.0))
        .await
        .expect("apply");
    for child in ["dev-1", "dev-2"] {
        nodes
            .apply_point(child, Point::text(POINT_TYPE_PARENT, "gw-1"))
            .await
            .expect("apply");
    }
    nodes
        .apply_point("dev-3", Point::text(POINT_TYPE_PARENT, "dev-1"))
        .await
        .expect("apply");

    let mut children: Vec<String> = nodes
        .node_children("gw-1")
        .await
        .expect("children")
        .into_iter()
        .map(|node| node.id)
        .collect();
    children.sort();
    assert_eq!(children, vec!["dev-1".to_string(), "dev-2".to_string()]);
}

#[tokio::test]
async fn for_each_node_visits_all() {
    let nodes = repo();
    for id in ["a", "b", "c"] {
        nodes.apply_point(id, Point::new("temp", 1.0)).await.expect("apply");
    }
    let mut seen = Vec::new();
    nodes
        .for_each_node(|node: Node| {
            seen.push(node.id);
            Ok(())
        })
        .expect("for_each");
    assert_eq!(seen.len(), 3);
}

#[tokio::test]
async fn non_finite_points_are_rejected_without_touching_store() {
    let nodes = repo();
    nodes.apply_point("ok", Point::new("temp", 1.0)).await.expect("apply");

    let err = nodes
        .apply_point("dev-nan", Point::new("temp", f64::NAN))
        .await
        .expect_err("nan");
    assert!(matches!(
        err,
        fleet_storage::StorageError::InvalidPoint { ref node_id, ref point_type }
            if node_id == "dev-nan" && point_type == "temp"
    ));
    let err = nodes
        .apply_points(
            "ok",
            vec![
                Point::new("hum", 40.0),
                Point {
                    min: Some(f64::NEG_INFINITY),
                    ..Point::new("volt", 1.0)
                },
            ],
        )
        .await
        .expect_err("infinite min");
    assert!(matches!(err, fleet_storage::StorageError::InvalidPoint { .. }));

    assert!(nodes.node("dev-nan").await.expect_err("not created").is_not_found());
    let all = nodes.nodes().await.expect("nodes still readable");
    assert_eq!(all.len(), 1);
    assert!(all[0].point("hum", "").is_none());
    nodes
        .apply_point("ok", Point::new("temp", 2.0))
        .await
        .expect("later apply");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_applies_all_land() {
    let nodes = Arc::new(repo());
    let mut tasks = Vec::new();
    for i in 0..16 {
        let nodes = nodes.clone();
        tasks.push(tokio::spawn(async move {
            nodes
                .apply_point("dev-1", Point::new("temp", 1.0).with_key(format!("k{i}")))
                .await
        }));
    }
    for task in tasks {
        task.await.expect("join").expect("apply");
    }
    assert_eq!(nodes.node("dev-1").await.expect("node").points.len(), 16);
}
