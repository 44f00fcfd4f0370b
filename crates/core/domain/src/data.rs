//! 节点与点数据结构。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// 节点类型元数据点（`text` 为节点类型）。
pub const POINT_TYPE_NODE_TYPE: &str = "nodeType";
/// 父节点元数据点（`text` 为父节点 ID）。
pub const POINT_TYPE_PARENT: &str = "parent";

/// 点：节点上带类型、键与时间戳的单个值。
///
/// 合并身份为 `(point_type, key)`，`key` 为空表示该类型只有一个实例。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Point {
    #[serde(rename = "type")]
    pub point_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(default)]
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default)]
    pub ts_ms: i64,
    #[serde(default)]
    pub duration_ms: i64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, f64>,
}

impl Point {
    /// 构造数值点。
    pub fn new(point_type: impl Into<String>, value: f64) -> Self {
        Self {
            point_type: point_type.into(),
            value,
            ..Self::default()
        }
    }

    /// 构造文本点。
    pub fn text(point_type: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            point_type: point_type.into(),
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_ts_ms(mut self, ts_ms: i64) -> Self {
        self.ts_ms = ts_ms;
        self
    }

    /// 是否与另一点具有相同合并身份。
    pub fn same_identity(&self, other: &Point) -> bool {
        self.point_type == other.point_type && self.key == other.key
    }

    /// 元数据点（节点类型/父节点）由合并引擎消费，不进入点集合。
    pub fn is_metadata(&self) -> bool {
        self.point_type == POINT_TYPE_NODE_TYPE || self.point_type == POINT_TYPE_PARENT
    }

    /// 全部数值字段均为有限值（非 NaN、非 ±inf）。
    ///
    /// 非有限值无法以 JSON 表示，写入前须拒绝。
    pub fn is_finite(&self) -> bool {
        self.value.is_finite()
            && self.min.is_none_or(f64::is_finite)
            && self.max.is_none_or(f64::is_finite)
            && self.attributes.values().all(|v| v.is_finite())
    }
}

/// 节点在线状态。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    #[default]
    Unknown,
    Online,
    Offline,
}

/// 软件升级状态。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwUpdateState {
    #[serde(default)]
    pub running: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    #[serde(default)]
    pub percent_done: i32,
}

/// 节点：设备树中的一个实体。
///
/// `rules` 必须与 `Rule.config.node_id == id` 的规则集合一致，由仓储层在事务内维护；
/// `cmd_pending` 与命令记录是否存在一致，同样由仓储层维护。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    #[serde(rename = "type", default)]
    pub node_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub parent: String,
    #[serde(default)]
    pub points: Vec<Point>,
    #[serde(default)]
    pub groups: Vec<Uuid>,
    #[serde(default)]
    pub rules: Vec<Uuid>,
    #[serde(default)]
    pub state: NodeState,
    #[serde(default)]
    pub cmd_pending: bool,
    #[serde(default)]
    pub sw_update_state: SwUpdateState,
}

impl Node {
    /// 以给定 ID 构造空节点（upsert-on-missing 时使用）。
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// 查找 `(point_type, key)` 对应的当前点。
    pub fn point(&self, point_type: &str, key: &str) -> Option<&Point> {
        self.points
            .iter()
            .find(|p| p.point_type == point_type && p.key == key)
    }

    /// 节点是否对分组集合中的任一分组可见。
    pub fn in_any_group(&self, groups: &[Uuid]) -> bool {
        self.groups.iter().any(|g| groups.contains(g))
    }
}
