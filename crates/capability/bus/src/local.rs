//! 进程内总线：请求直接交给绑定的处理器。

use crate::bus::{BusHandler, MessageBus};
use crate::error::BusError;
use async_trait::async_trait;
use fleet_telemetry::{record_bus_request, record_bus_timeout};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

#[derive(Clone)]
pub struct LocalBus {
    handler: Arc<dyn BusHandler>,
}

impl LocalBus {
    pub fn new(handler: Arc<dyn BusHandler>) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl MessageBus for LocalBus {
    async fn request(
        &self,
        subject: &str,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> Result<Vec<u8>, BusError> {
        record_bus_request();
        match tokio::time::timeout(timeout, self.handler.handle(subject, &payload)).await {
            Ok(result) => result,
            Err(_) => {
                record_bus_timeout();
                Err(BusError::Timeout {
                    subject: subject.to_string(),
                })
            }
        }
    }

    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), BusError> {
        if let Err(err) = self.handler.handle(subject, &payload).await {
            warn!(target: "fleet.bus", subject = %subject, "publish handler failed: {}", err);
        }
        Ok(())
    }
}
