//! 线上编码（serde_json）。
//!
//! 节点与点保留全部字段，`decode(encode(x)) == x`。

use crate::error::BusError;
use domain::{Node, Point};
use serde::{Deserialize, Serialize};

/// 写入某节点的一批点。
///
/// `ack` 为 true 时接收方须在事务内应用后应答；否则为发后即忘。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointBatch {
    pub points: Vec<Point>,
    #[serde(default)]
    pub ack: bool,
}

pub fn encode_node(node: &Node) -> Result<Vec<u8>, BusError> {
    Ok(serde_json::to_vec(node)?)
}

pub fn decode_node(bytes: &[u8]) -> Result<Node, BusError> {
    Ok(serde_json::from_slice(bytes)?)
}

pub fn encode_nodes(nodes: &[Node]) -> Result<Vec<u8>, BusError> {
    Ok(serde_json::to_vec(nodes)?)
}

pub fn decode_nodes(bytes: &[u8]) -> Result<Vec<Node>, BusError> {
    Ok(serde_json::from_slice(bytes)?)
}

pub fn encode_points(batch: &PointBatch) -> Result<Vec<u8>, BusError> {
    Ok(serde_json::to_vec(batch)?)
}

pub fn decode_points(bytes: &[u8]) -> Result<PointBatch, BusError> {
    Ok(serde_json::from_slice(bytes)?)
}
