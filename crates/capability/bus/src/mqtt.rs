//! MQTT 总线（rumqttc）。
//!
//! 主题映射：`<prefix>/<subject 中 '.' 替换为 '/'>`。
//! 请求/应答：每个客户端订阅自己的应答主题 `<prefix>/_reply/<client_id>`，
//! 请求携带关联 ID 与应答主题，等待中的请求以 oneshot 发送端登记。

use crate::bus::{BusHandler, MessageBus};
use crate::error::BusError;
use async_trait::async_trait;
use fleet_telemetry::{record_bus_request, record_bus_timeout};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, Publish, QoS};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// MQTT 总线配置。
#[derive(Debug, Clone)]
pub struct MqttBusConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub topic_prefix: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireRequest {
    correlation_id: Uuid,
    /// 为空表示发布（无需应答）。
    reply_to: Option<String>,
    payload: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireReply {
    correlation_id: Uuid,
    result: Result<Vec<u8>, String>,
}

type PendingReply = oneshot::Sender<Result<Vec<u8>, String>>;

struct Inner {
    client: AsyncClient,
    prefix: String,
    reply_topic: String,
    pending: Mutex<HashMap<Uuid, PendingReply>>,
    handler: RwLock<Option<Arc<dyn BusHandler>>>,
}

#[derive(Clone)]
pub struct MqttBus {
    inner: Arc<Inner>,
}

impl MqttBus {
    /// 建立连接并启动事件循环任务。
    pub fn connect(
        config: MqttBusConfig,
    ) -> Result<(Self, tokio::task::JoinHandle<()>), BusError> {
        let client_id = format!("fleet-node-{}", Uuid::new_v4());
        let mut options = MqttOptions::new(client_id.clone(), config.host, config.port);
        options.set_keep_alive(Duration::from_secs(30));
        if let (Some(username), Some(password)) = (config.username, config.password) {
            options.set_credentials(username, password);
        }
        let (client, mut eventloop) = AsyncClient::new(options, 64);
        let prefix = config.topic_prefix.trim_end_matches('/').to_string();
        let inner = Arc::new(Inner {
            client,
            reply_topic: join_topic(&prefix, &format!("_reply/{client_id}")),
            prefix,
            pending: Mutex::new(HashMap::new()),
            handler: RwLock::new(None),
        });
        // 首次 ConnAck 之前发出的请求也需要应答主题已在订阅队列中
        for filter in subscription_filters(&inner.prefix, &inner.reply_topic, false) {
            inner.client.try_subscribe(filter, QoS::AtLeastOnce)?;
        }

        let state = inner.clone();
        let handle = tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!(target: "fleet.bus", prefix = %state.prefix, "mqtt connected");
                        state.resubscribe().await;
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        state.clone().dispatch(publish).await;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        warn!(target: "fleet.bus", "mqtt eventloop error: {}", err);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });
        Ok((Self { inner }, handle))
    }

    /// 以 `handler` 应答发往本前缀下 `node.*` 主题的请求。
    pub async fn serve(&self, handler: Arc<dyn BusHandler>) -> Result<(), BusError> {
        *self.inner.handler.write().await = Some(handler);
        self.inner
            .client
            .subscribe(self.inner.request_filter(), QoS::AtLeastOnce)
            .await?;
        Ok(())
    }

    pub fn topic_for(&self, subject: &str) -> String {
        subject_to_topic(&self.inner.prefix, subject)
    }
}

impl Inner {
    fn request_filter(&self) -> String {
        request_filter(&self.prefix)
    }

    /// 连接建立（含重连）后恢复订阅。
    async fn resubscribe(&self) {
        let serving = self.handler.read().await.is_some();
        for filter in subscription_filters(&self.prefix, &self.reply_topic, serving) {
            if let Err(err) = self.client.try_subscribe(filter.clone(), QoS::AtLeastOnce) {
                warn!(target: "fleet.bus", topic = %filter, "mqtt subscribe error: {}", err);
            }
        }
    }

    async fn dispatch(self: Arc<Self>, publish: Publish) {
        if publish.topic == self.reply_topic {
            self.complete(&publish.payload).await;
            return;
        }
        let Some(subject) = topic_to_subject(&self.prefix, &publish.topic) else {
            debug!(target: "fleet.bus", topic = %publish.topic, "topic skipped");
            return;
        };
        let Some(handler) = self.handler.read().await.clone() else {
            return;
        };
        tokio::spawn(async move {
            self.answer(handler, subject, &publish.payload).await;
        });
    }

    async fn complete(&self, payload: &[u8]) {
        let reply: WireReply = match serde_json::from_slice(payload) {
            Ok(reply) => reply,
            Err(err) => {
                warn!(target: "fleet.bus", "reply payload invalid: {}", err);
                return;
            }
        };
        // 超时后迟到的应答找不到登记项，直接丢弃
        if let Some(waiter) = self.pending.lock().await.remove(&reply.correlation_id) {
            let _ = waiter.send(reply.result);
        }
    }

    async fn answer(&self, handler: Arc<dyn BusHandler>, subject: String, payload: &[u8]) {
        let request: WireRequest = match serde_json::from_slice(payload) {
            Ok(request) => request,
            Err(err) => {
                warn!(target: "fleet.bus", subject = %subject, "request payload invalid: {}", err);
                return;
            }
        };
        let result = handler.handle(&subject, &request.payload).await;
        let Some(reply_to) = request.reply_to else {
            if let Err(err) = result {
                warn!(target: "fleet.bus", subject = %subject, "publish handler failed: {}", err);
            }
            return;
        };
        let reply = WireReply {
            correlation_id: request.correlation_id,
            result: result.map_err(|err| err.to_string()),
        };
        let body = match serde_json::to_vec(&reply) {
            Ok(body) => body,
            Err(err) => {
                warn!(target: "fleet.bus", subject = %subject, "reply encode failed: {}", err);
                return;
            }
        };
        if let Err(err) = self
            .client
            .publish(reply_to, QoS::AtLeastOnce, false, body)
            .await
        {
            warn!(target: "fleet.bus", subject = %subject, "reply publish failed: {}", err);
        }
    }
}

#[async_trait]
impl MessageBus for MqttBus {
    async fn request(
        &self,
        subject: &str,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> Result<Vec<u8>, BusError> {
        record_bus_request();
        let correlation_id = Uuid::new_v4();
        let body = serde_json::to_vec(&WireRequest {
            correlation_id,
            reply_to: Some(self.inner.reply_topic.clone()),
            payload,
        })?;

        let (tx, rx) = oneshot::channel();
        self.inner.pending.lock().await.insert(correlation_id, tx);
        if let Err(err) = self
            .inner
            .client
            .publish(self.topic_for(subject), QoS::AtLeastOnce, false, body)
            .await
        {
            self.inner.pending.lock().await.remove(&correlation_id);
            return Err(err.into());
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(Ok(reply))) => Ok(reply),
            Ok(Ok(Err(message))) => Err(BusError::Remote(message)),
            Ok(Err(_)) => Err(BusError::Transport("reply channel closed".to_string())),
            Err(_) => {
                self.inner.pending.lock().await.remove(&correlation_id);
                record_bus_timeout();
                Err(BusError::Timeout {
                    subject: subject.to_string(),
                })
            }
        }
    }

    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), BusError> {
        let body = serde_json::to_vec(&WireRequest {
            correlation_id: Uuid::new_v4(),
            reply_to: None,
            payload,
        })?;
        self.inner
            .client
            .publish(self.topic_for(subject), QoS::AtLeastOnce, false, body)
            .await?;
        Ok(())
    }
}

fn join_topic(prefix: &str, rest: &str) -> String {
    if prefix.is_empty() {
        rest.to_string()
    } else {
        format!("{prefix}/{rest}")
    }
}

fn request_filter(prefix: &str) -> String {
    join_topic(prefix, "node/#")
}

/// 应答主题总在首位；处于服务状态时再加请求主题。
fn subscription_filters(prefix: &str, reply_topic: &str, serving: bool) -> Vec<String> {
    let mut filters = vec![reply_topic.to_string()];
    if serving {
        filters.push(request_filter(prefix));
    }
    filters
}

fn subject_to_topic(prefix: &str, subject: &str) -> String {
    join_topic(prefix, &subject.replace('.', "/"))
}

fn topic_to_subject(prefix: &str, topic: &str) -> Option<String> {
    let rest = if prefix.is_empty() {
        topic
    } else {
        topic.strip_prefix(prefix)?.strip_prefix('/')?
    };
    if rest.is_empty() {
        return None;
    }
    Some(rest.replace('/', "."))
}
