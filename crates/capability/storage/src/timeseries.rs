//! 时序写入接口与内存实现。
//!
//! 写入为尽力而为：调用方记录失败日志，从不把失败向上传播。

use crate::error::StorageError;
use async_trait::async_trait;
use domain::Point;
use std::sync::RwLock;

/// 时序写入目标。
#[async_trait]
pub trait TimeSeriesSink: Send + Sync {
    async fn write(&self, node_id: &str, point: &Point) -> Result<(), StorageError>;
}

/// 空写入（未配置时序后端时使用）。
#[derive(Debug, Default)]
pub struct NoopSink;

#[async_trait]
impl TimeSeriesSink for NoopSink {
    async fn write(&self, _node_id: &str, _point: &Point) -> Result<(), StorageError> {
        Ok(())
    }
}

/// 时序写入内存实现
///
/// 仅用于本地测试；`failing()` 构造的实例对每次写入都返回错误。
pub struct InMemorySink {
    samples: RwLock<Vec<(String, Point)>>,
    fail: bool,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self {
            samples: RwLock::new(Vec::new()),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            samples: RwLock::new(Vec::new()),
            fail: true,
        }
    }

    /// 已写入的 (节点 ID, 点)。
    pub fn samples(&self) -> Vec<(String, Point)> {
        self.samples.read().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Default for InMemorySink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TimeSeriesSink for InMemorySink {
    async fn write(&self, node_id: &str, point: &Point) -> Result<(), StorageError> {
        if self.fail {
            return Err(StorageError::Sink("sink unavailable".to_string()));
        }
        let mut samples = self
            .samples
            .write()
            .map_err(|_| StorageError::Sink("lock failed".to_string()))?;
        samples.push((node_id.to_string(), point.clone()));
        Ok(())
    }
}
