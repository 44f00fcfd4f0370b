//! 存储层错误类型
//!
//! - 记录不存在 / 已存在
//! - 非法点（非有限数值）
//! - 编解码错误
//! - 底层 sled 错误
//! - 事务冲突（仅在事务内部流转，由 sled 重试）

use crate::store::Collection;
use sled::transaction::UnabortableTransactionError;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("{collection} record not found: {key}")]
    NotFound { collection: Collection, key: String },
    #[error("{collection} record already exists: {key}")]
    AlreadyExists { collection: Collection, key: String },
    /// 点含非有限数值（NaN / ±inf），拒绝写入。
    #[error("invalid point {point_type} for node {node_id}: non-finite number")]
    InvalidPoint { node_id: String, point_type: String },
    #[error("codec error: {0}")]
    Codec(String),
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("time-series sink error: {0}")]
    Sink(String),
    #[error("transaction conflict: {0}")]
    Conflict(#[from] UnabortableTransactionError),
}

impl StorageError {
    pub fn not_found(collection: Collection, key: impl Into<String>) -> Self {
        Self::NotFound {
            collection,
            key: key.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Codec(err.to_string())
    }
}
