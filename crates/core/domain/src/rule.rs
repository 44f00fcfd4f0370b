//! 规则配置与状态。规则求值不在本模块范围内。

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 规则条件。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCondition {
    pub point_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub point_key: String,
    pub operator: String,
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub min_active_ms: i64,
}

/// 规则动作。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleAction {
    pub action_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub target: String,
}

/// 规则配置，绑定到唯一目标节点。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleConfig {
    #[serde(default)]
    pub description: String,
    pub node_id: String,
    #[serde(default)]
    pub conditions: Vec<RuleCondition>,
    #[serde(default)]
    pub actions: Vec<RuleAction>,
}

/// 规则运行状态。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleState {
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub last_action_ms: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: Uuid,
    pub config: RuleConfig,
    #[serde(default)]
    pub state: RuleState,
}

impl Rule {
    /// 构造尚未分配 ID 的规则（插入时由仓储分配）。
    pub fn new(config: RuleConfig) -> Self {
        Self {
            id: Uuid::nil(),
            config,
            state: RuleState::default(),
        }
    }
}
