//! 总线客户端辅助函数。

use crate::bus::MessageBus;
use crate::codec::{PointBatch, decode_node, decode_nodes, encode_points};
use crate::error::BusError;
use crate::subject;
use domain::{Node, Point, now_epoch_ms};
use std::time::Duration;

/// 默认请求超时。
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

pub async fn get_node(
    bus: &dyn MessageBus,
    id: &str,
    timeout: Duration,
) -> Result<Node, BusError> {
    let reply = bus.request(&subject::node(id), Vec::new(), timeout).await?;
    decode_node(&reply)
}

/// 直接子节点（不递归）。
pub async fn get_node_children(
    bus: &dyn MessageBus,
    id: &str,
    timeout: Duration,
) -> Result<Vec<Node>, BusError> {
    let reply = bus
        .request(&subject::children(id), Vec::new(), timeout)
        .await?;
    decode_nodes(&reply)
}

/// 向节点发送点批次；`ack` 时等待对端应用完成。
///
/// 未带时间戳（`ts_ms == 0`）的点以发送时刻补齐。
pub async fn send_points(
    bus: &dyn MessageBus,
    id: &str,
    mut points: Vec<Point>,
    ack: bool,
    timeout: Duration,
) -> Result<(), BusError> {
    let now = now_epoch_ms();
    for point in points.iter_mut().filter(|p| p.ts_ms == 0) {
        point.ts_ms = now;
    }
    forward_points(bus, id, points, ack, timeout).await
}

/// 原样转发点批次，不补时间戳（复制已存储的点时使用）。
pub async fn forward_points(
    bus: &dyn MessageBus,
    id: &str,
    points: Vec<Point>,
    ack: bool,
    timeout: Duration,
) -> Result<(), BusError> {
    let payload = encode_points(&PointBatch { points, ack })?;
    let subject = subject::points(id);
    if ack {
        bus.request(&subject, payload, timeout).await?;
        Ok(())
    } else {
        bus.publish(&subject, payload).await
    }
}
