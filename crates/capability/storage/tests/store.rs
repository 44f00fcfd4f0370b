use domain::{Command, Node};
use fleet_storage::{Collection, StorageError, Store};

#[test]
fn insert_update_delete_contracts() {
    let store = Store::temporary().expect("store");
    let node = Node::new("dev-1");

    store.insert("dev-1", &node).expect("insert");
    let err = store.insert("dev-1", &node).expect_err("duplicate insert");
    assert!(matches!(err, StorageError::AlreadyExists { collection: Collection::Nodes, .. }));

    let err = store
        .update("dev-2", &Node::new("dev-2"))
        .expect_err("update missing");
    assert!(err.is_not_found());

    let mut changed = node.clone();
    changed.node_type = "device".to_string();
    store.update("dev-1", &changed).expect("update");
    let got: Node = store.get("dev-1").expect("get");
    assert_eq!(got.node_type, "device");

    store.delete::<Node, _>("dev-1").expect("delete");
    assert!(store.try_get::<Node, _>("dev-1").expect("try_get").is_none());
    assert!(store.delete::<Node, _>("dev-1").expect_err("delete missing").is_not_found());
}

#[test]
fn failed_transaction_rolls_back_every_write() {
    let store = Store::temporary().expect("store");

    let result: Result<(), StorageError> = store.transaction(|tx| {
        tx.upsert("dev-1", &Node::new("dev-1"))?;
        tx.upsert("dev-1", &Command::new("dev-1", "reboot"))?;
        tx.get::<Node, _>("missing")?;
        Ok(())
    });

    assert!(result.expect_err("aborted").is_not_found());
    assert!(store.try_get::<Node, _>("dev-1").expect("node").is_none());
    assert!(store.try_get::<Command, _>("dev-1").expect("cmd").is_none());
}

#[test]
fn for_each_stops_on_first_error() {
    let store = Store::temporary().expect("store");
    for id in ["a", "b", "c"] {
        store.upsert(id, &Node::new(id)).expect("upsert");
    }

    let mut visited = 0;
    let err = store
        .for_each(|_: Node| {
            visited += 1;
            if visited == 2 {
                return Err(StorageError::Backend("stop".to_string()));
            }
            Ok(())
        })
        .expect_err("stopped");
    assert!(matches!(err, StorageError::Backend(_)));
    assert_eq!(visited, 2);
}

#[test]
fn find_filters_and_find_one_reports_not_found() {
    let store = Store::temporary().expect("store");
    let mut sensor = Node::new("s-1");
    sensor.node_type = "sensor".to_string();
    store.upsert("s-1", &sensor).expect("upsert");
    store.upsert("d-1", &Node::new("d-1")).expect("upsert");

    let sensors = store
        .find(|node: &Node| node.node_type == "sensor")
        .expect("find");
    assert_eq!(sensors.len(), 1);
    assert_eq!(sensors[0].id, "s-1");

    let err = store
        .find_one(|node: &Node| node.node_type == "modem")
        .expect_err("none");
    assert!(err.is_not_found());
}

#[test]
fn records_survive_reopen() {
    let dir = std::env::temp_dir().join(format!("fleet-store-{}", uuid::Uuid::new_v4()));
    {
        let store = Store::open(&dir, None).expect("open");
        store.upsert("dev-1", &Node::new("dev-1")).expect("upsert");
        store.flush().expect("flush");
    }
    let store = Store::open(&dir, None).expect("reopen");
    let node: Node = store.get("dev-1").expect("get");
    assert_eq!(node.id, "dev-1");
    drop(store);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn delete_matching_removes_only_matches() {
    let store = Store::temporary().expect("store");
    for id in ["keep", "drop-1", "drop-2"] {
        store.upsert(id, &Node::new(id)).expect("upsert");
    }
    let removed = store
        .delete_matching(|node: &Node| node.id.starts_with("drop"))
        .expect("delete");
    assert_eq!(removed, 2);
    let left: Vec<Node> = store.all().expect("all");
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].id, "keep");
}
