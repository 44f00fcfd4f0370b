//! Redis 时序写入实现
//!
//! 每个 (节点, 点类型, 键) 一条列表：`node:{id}:series:{type}[:{key}]`，
//! 采样以 JSON 追加到尾部，可按最大长度裁剪。

use crate::error::StorageError;
use crate::timeseries::TimeSeriesSink;
use domain::Point;
use redis::AsyncCommands;

fn series_key(node_id: &str, point: &Point) -> String {
    if point.key.is_empty() {
        format!("node:{}:series:{}", node_id, point.point_type)
    } else {
        format!("node:{}:series:{}:{}", node_id, point.point_type, point.key)
    }
}

/// Redis 时序存储
pub struct RedisSink {
    client: redis::Client,
    max_len: Option<u64>,
}

impl RedisSink {
    pub fn new(client: redis::Client, max_len: Option<u64>) -> Self {
        let max_len = match max_len {
            Some(0) => None,
            other => other,
        };
        Self { client, max_len }
    }

    pub fn connect(redis_url: &str, max_len: Option<u64>) -> Result<Self, StorageError> {
        let client =
            redis::Client::open(redis_url).map_err(|err| StorageError::Sink(err.to_string()))?;
        Ok(Self::new(client, max_len))
    }
}

#[async_trait::async_trait]
impl TimeSeriesSink for RedisSink {
    async fn write(&self, node_id: &str, point: &Point) -> Result<(), StorageError> {
        let mut connection = self
            .client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(|err| StorageError::Sink(err.to_string()))?;
        let data = serde_json::to_string(point)?;
        let key = series_key(node_id, point);
        connection
            .rpush::<_, _, ()>(&key, data)
            .await
            .map_err(|err| StorageError::Sink(err.to_string()))?;
        if let Some(max_len) = self.max_len {
            let start = -(max_len.min(isize::MAX as u64) as isize);
            connection
                .ltrim::<_, ()>(&key, start, -1)
                .await
                .map_err(|err| StorageError::Sink(err.to_string()))?;
        }
        Ok(())
    }
}
