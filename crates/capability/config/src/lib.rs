//! 节点进程运行配置加载（`FLEET_*` 环境变量）。

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// MQTT 连接配置。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub topic_prefix: String,
}

/// 节点进程运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub init_db: bool,
    /// `None` 表示关闭后台定时刷盘。
    pub flush_every_ms: Option<u64>,
    pub mqtt: MqttConfig,
    pub redis_url: Option<String>,
    pub redis_series_max_len: u64,
    /// 上游总线；未配置时不做周期复制。
    pub upstream: Option<MqttConfig>,
    pub sync_root_id: Option<String>,
    pub sync_interval_seconds: u64,
    pub request_timeout_seconds: u64,
    /// 设置后导出全库并退出。
    pub dump_path: Option<PathBuf>,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let data_dir = read_optional("FLEET_DATA_DIR")
            .map(PathBuf::from)
            .ok_or_else(|| ConfigError::Missing("FLEET_DATA_DIR".to_string()))?;
        let init_db = read_bool_with_default("FLEET_INIT_DB", true);
        let flush_every_ms =
            Some(read_u64_with_default("FLEET_FLUSH_EVERY_MS", 500)?).filter(|ms| *ms > 0);

        let mqtt = MqttConfig {
            host: env::var("FLEET_MQTT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: read_u16_with_default("FLEET_MQTT_PORT", 1883)?,
            username: read_optional("FLEET_MQTT_USERNAME"),
            password: read_optional("FLEET_MQTT_PASSWORD"),
            topic_prefix: env::var("FLEET_MQTT_TOPIC_PREFIX")
                .unwrap_or_else(|_| "fleet".to_string()),
        };
        let upstream = match read_optional("FLEET_UPSTREAM_MQTT_HOST") {
            Some(host) => Some(MqttConfig {
                host,
                port: read_u16_with_default("FLEET_UPSTREAM_MQTT_PORT", 1883)?,
                username: read_optional("FLEET_UPSTREAM_MQTT_USERNAME"),
                password: read_optional("FLEET_UPSTREAM_MQTT_PASSWORD"),
                topic_prefix: env::var("FLEET_UPSTREAM_MQTT_TOPIC_PREFIX")
                    .unwrap_or_else(|_| mqtt.topic_prefix.clone()),
            }),
            None => None,
        };

        Ok(Self {
            data_dir,
            init_db,
            flush_every_ms,
            mqtt,
            redis_url: read_optional("FLEET_REDIS_URL"),
            redis_series_max_len: read_u64_with_default("FLEET_REDIS_SERIES_MAX_LEN", 1000)?,
            upstream,
            sync_root_id: read_optional("FLEET_SYNC_ROOT_ID"),
            sync_interval_seconds: read_u64_with_default("FLEET_SYNC_INTERVAL_SECONDS", 60)?,
            request_timeout_seconds: read_u64_with_default("FLEET_REQUEST_TIMEOUT_SECONDS", 20)?,
            dump_path: read_optional("FLEET_DUMP_PATH").map(PathBuf::from),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_seconds.max(1))
    }
}

fn read_u16_with_default(key: &str, default: u16) -> Result<u16, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u16>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}

fn read_bool_with_default(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "on"),
        Err(_) => default,
    }
}
