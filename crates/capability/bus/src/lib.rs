//! # Fleet Bus 模块
//!
//! 节点树在进程之间流动所依赖的请求/应答与发布通道。
//!
//! - `subject`：主题命名（`node.<id>` / `node.<id>.children` / `node.<id>.points`）
//! - `codec`：节点与点批次的线上编码
//! - `bus`：[`MessageBus`] 与 [`BusHandler`] 接口
//! - `local`：进程内总线（测试与嵌入场景）
//! - `mqtt`：基于 rumqttc 的 MQTT 总线
//! - `service`：以本地存储应答主题请求的 [`NodeService`]
//! - `client`：`get_node` / `get_node_children` / `send_points` / `forward_points`

pub mod bus;
pub mod client;
pub mod codec;
pub mod error;
pub mod local;
pub mod mqtt;
pub mod service;
pub mod subject;

pub use bus::{BusHandler, MessageBus};
pub use client::{
    DEFAULT_REQUEST_TIMEOUT, forward_points, get_node, get_node_children, send_points,
};
pub use codec::{
    PointBatch, decode_node, decode_nodes, decode_points, encode_node, encode_nodes,
    encode_points,
};
pub use error::BusError;
pub use local::LocalBus;
pub use mqtt::{MqttBus, MqttBusConfig};
pub use service::NodeService;
pub use subject::Subject;
