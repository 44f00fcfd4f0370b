//! 总线接口 Trait 定义

use crate::error::BusError;
use async_trait::async_trait;
use std::time::Duration;

/// 请求/应答 + 发布的消息总线。
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// 发送请求并等待应答，超过 `timeout` 返回 [`BusError::Timeout`]。
    async fn request(
        &self,
        subject: &str,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> Result<Vec<u8>, BusError>;

    /// 发后即忘。
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), BusError>;
}

/// 主题处理器：应答发往本地的请求。
#[async_trait]
pub trait BusHandler: Send + Sync {
    async fn handle(&self, subject: &str, payload: &[u8]) -> Result<Vec<u8>, BusError>;
}
