use fleet_storage::StorageError;

/// 总线错误。
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("request timed out: {subject}")]
    Timeout { subject: String },
    #[error("no responder for subject: {subject}")]
    NoResponder { subject: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("codec error: {0}")]
    Codec(String),
    /// 对端处理失败（经由线上应答带回的错误文本）。
    #[error("remote error: {0}")]
    Remote(String),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl BusError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

impl From<serde_json::Error> for BusError {
    fn from(err: serde_json::Error) -> Self {
        Self::Codec(err.to_string())
    }
}

impl From<rumqttc::ClientError> for BusError {
    fn from(err: rumqttc::ClientError) -> Self {
        Self::Transport(err.to_string())
    }
}
