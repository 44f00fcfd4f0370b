use domain::{Command, Point, Rule, RuleConfig};
use fleet_storage::{
    CommandStore, GroupStore, IdentityRepository, NodeRepository, NodeStore, RuleStore, Store,
    StoreDump, dump,
};
use std::sync::Arc;

#[tokio::test]
async fn dump_writes_all_collections() {
    let store = Arc::new(Store::temporary().expect("store"));
    let nodes = NodeRepository::new(store.clone());
    let identity = IdentityRepository::new(store);
    identity.initialize().await.expect("init");
    nodes.apply_point("dev-1", Point::new("temp", 1.0)).await.expect("apply");
    nodes
        .set_command(Command::new("dev-1", "reboot"))
        .await
        .expect("cmd");
    nodes
        .insert_rule(Rule::new(RuleConfig {
            node_id: "dev-1".to_string(),
            ..RuleConfig::default()
        }))
        .await
        .expect("rule");

    let mut out = Vec::new();
    dump(&nodes, &identity, &mut out).await.expect("dump");

    let text = String::from_utf8(out).expect("utf8");
    assert!(text.contains('\n'));
    let value: serde_json::Value = serde_json::from_str(&text).expect("json");
    for key in ["nodes", "users", "groups", "rules", "commands"] {
        assert_eq!(value[key].as_array().expect(key).len(), 1, "{key}");
    }
    let parsed: StoreDump = serde_json::from_value(value).expect("typed");
    assert_eq!(parsed.commands[0].cmd, "reboot");
}
