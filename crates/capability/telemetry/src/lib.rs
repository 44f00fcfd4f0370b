//! 日志初始化与进程级计数指标。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 指标快照。
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub points_applied: u64,
    pub sink_write_failure: u64,
    pub commands_set: u64,
    pub commands_taken: u64,
    pub commands_cleared: u64,
    pub nodes_replicated: u64,
    pub replication_failure: u64,
    pub bus_requests: u64,
    pub bus_timeouts: u64,
}

/// 进程级计数指标。
pub struct TelemetryMetrics {
    points_applied: AtomicU64,
    sink_write_failure: AtomicU64,
    commands_set: AtomicU64,
    commands_taken: AtomicU64,
    commands_cleared: AtomicU64,
    nodes_replicated: AtomicU64,
    replication_failure: AtomicU64,
    bus_requests: AtomicU64,
    bus_timeouts: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            points_applied: AtomicU64::new(0),
            sink_write_failure: AtomicU64::new(0),
            commands_set: AtomicU64::new(0),
            commands_taken: AtomicU64::new(0),
            commands_cleared: AtomicU64::new(0),
            nodes_replicated: AtomicU64::new(0),
            replication_failure: AtomicU64::new(0),
            bus_requests: AtomicU64::new(0),
            bus_timeouts: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            points_applied: self.points_applied.load(Ordering::Relaxed),
            sink_write_failure: self.sink_write_failure.load(Ordering::Relaxed),
            commands_set: self.commands_set.load(Ordering::Relaxed),
            commands_taken: self.commands_taken.load(Ordering::Relaxed),
            commands_cleared: self.commands_cleared.load(Ordering::Relaxed),
            nodes_replicated: self.nodes_replicated.load(Ordering::Relaxed),
            replication_failure: self.replication_failure.load(Ordering::Relaxed),
            bus_requests: self.bus_requests.load(Ordering::Relaxed),
            bus_timeouts: self.bus_timeouts.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info，可由 RUST_LOG 覆盖）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 记录已合并的点数量。
pub fn record_points_applied(count: u64) {
    metrics().points_applied.fetch_add(count, Ordering::Relaxed);
}

/// 记录时序写入失败次数。
pub fn record_sink_write_failure() {
    metrics().sink_write_failure.fetch_add(1, Ordering::Relaxed);
}

pub fn record_command_set() {
    metrics().commands_set.fetch_add(1, Ordering::Relaxed);
}

pub fn record_command_taken() {
    metrics().commands_taken.fetch_add(1, Ordering::Relaxed);
}

pub fn record_command_cleared() {
    metrics().commands_cleared.fetch_add(1, Ordering::Relaxed);
}

/// 记录已复制的节点数。
pub fn record_node_replicated() {
    metrics().nodes_replicated.fetch_add(1, Ordering::Relaxed);
}

pub fn record_replication_failure() {
    metrics()
        .replication_failure
        .fetch_add(1, Ordering::Relaxed);
}

pub fn record_bus_request() {
    metrics().bus_requests.fetch_add(1, Ordering::Relaxed);
}

pub fn record_bus_timeout() {
    metrics().bus_timeouts.fetch_add(1, Ordering::Relaxed);
}
