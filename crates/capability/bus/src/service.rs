//! 节点应答服务：以本地节点仓储应答 `node.*` 主题。

use crate::bus::BusHandler;
use crate::codec::{decode_points, encode_node, encode_nodes};
use crate::error::BusError;
use crate::subject::Subject;
use async_trait::async_trait;
use fleet_storage::NodeStore;
use std::sync::Arc;
use tracing::debug;

pub struct NodeService {
    nodes: Arc<dyn NodeStore>,
}

impl NodeService {
    pub fn new(nodes: Arc<dyn NodeStore>) -> Self {
        Self { nodes }
    }
}

#[async_trait]
impl BusHandler for NodeService {
    async fn handle(&self, subject: &str, payload: &[u8]) -> Result<Vec<u8>, BusError> {
        let Some(parsed) = Subject::parse(subject) else {
            return Err(BusError::NoResponder {
                subject: subject.to_string(),
            });
        };
        match parsed {
            Subject::Node(id) => {
                let node = self.nodes.node(&id).await?;
                encode_node(&node)
            }
            Subject::Children(id) => {
                let children = self.nodes.node_children(&id).await?;
                encode_nodes(&children)
            }
            Subject::Points(id) => {
                let batch = decode_points(payload)?;
                debug!(
                    target: "fleet.bus",
                    node_id = %id,
                    count = batch.points.len(),
                    ack = batch.ack,
                    "applying point batch"
                );
                self.nodes.apply_points(&id, batch.points).await?;
                Ok(Vec::new())
            }
        }
    }
}
