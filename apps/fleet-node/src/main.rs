//! 节点进程：打开本地存储，经 MQTT 应答节点请求，并按周期把子树复制到上游。

use fleet_bus::{LocalBus, MqttBus, MqttBusConfig, NodeService};
use fleet_config::{AppConfig, MqttConfig};
use fleet_replication::Replicator;
use fleet_storage::{
    GroupStore, IdentityRepository, NodeRepository, NoopSink, RedisSink, Store, TimeSeriesSink,
    dump,
};
use fleet_telemetry::{init_tracing, metrics};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    // 从环境变量加载运行配置
    let config = AppConfig::from_env()?;
    // 初始化结构化日志
    init_tracing();

    let store = Arc::new(Store::open(&config.data_dir, config.flush_every_ms)?);
    let sink: Arc<dyn TimeSeriesSink> = match &config.redis_url {
        Some(url) => Arc::new(RedisSink::connect(url, Some(config.redis_series_max_len))?),
        None => Arc::new(NoopSink),
    };
    let nodes = Arc::new(NodeRepository::with_sink(store.clone(), sink));
    let identity = IdentityRepository::new(store.clone());
    if config.init_db {
        identity.initialize().await?;
    }
    info!(target: "fleet.node", data_dir = %config.data_dir.display(), "store opened");

    // 导出模式：写出全库后退出
    if let Some(path) = &config.dump_path {
        let file = std::io::BufWriter::new(std::fs::File::create(path)?);
        dump(&nodes, &identity, file).await?;
        info!(target: "fleet.node", path = %path.display(), "store dumped");
        return Ok(());
    }

    let service = Arc::new(NodeService::new(nodes.clone()));
    let (bus, bus_task) = MqttBus::connect(bus_config(&config.mqtt))?;
    bus.serve(service.clone()).await?;
    info!(
        target: "fleet.node",
        topic_prefix = %config.mqtt.topic_prefix,
        "serving node requests"
    );

    let cancel = CancellationToken::new();
    let sync_task = match (&config.upstream, &config.sync_root_id) {
        (Some(upstream), Some(root_id)) => {
            let (upstream_bus, upstream_task) = MqttBus::connect(bus_config(upstream))?;
            let sync = SyncLoop {
                src: LocalBus::new(service.clone()),
                dest: upstream_bus,
                root_id: root_id.clone(),
                replicator: Replicator::new(config.request_timeout()),
                interval: config.sync_interval(),
            };
            let cancel = cancel.clone();
            Some(tokio::spawn(async move {
                sync.run(cancel).await;
                upstream_task.abort();
            }))
        }
        (Some(_), None) => {
            warn!(target: "fleet.node", "upstream configured without FLEET_SYNC_ROOT_ID, sync disabled");
            None
        }
        _ => None,
    };

    tokio::signal::ctrl_c().await?;
    info!(target: "fleet.node", "shutdown requested");
    // 取消进行中的复制：已写入上游的节点保留
    cancel.cancel();
    if let Some(task) = sync_task {
        let _ = task.await;
    }
    bus_task.abort();
    store.flush()?;

    let snapshot = metrics().snapshot();
    info!(
        target: "fleet.node",
        points_applied = snapshot.points_applied,
        nodes_replicated = snapshot.nodes_replicated,
        replication_failure = snapshot.replication_failure,
        "node stopped"
    );
    Ok(())
}

fn bus_config(config: &MqttConfig) -> MqttBusConfig {
    MqttBusConfig {
        host: config.host.clone(),
        port: config.port,
        username: config.username.clone(),
        password: config.password.clone(),
        topic_prefix: config.topic_prefix.clone(),
    }
}

/// 周期性把本地子树复制到上游。
struct SyncLoop {
    src: LocalBus,
    dest: MqttBus,
    root_id: String,
    replicator: Replicator,
    interval: Duration,
}

impl SyncLoop {
    async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    // 失败已由复制器记录，下一周期重试
                    let _ = self
                        .replicator
                        .replicate_subtree(&self.src, &self.dest, &self.root_id, "", &cancel)
                        .await;
                }
            }
        }
    }
}
