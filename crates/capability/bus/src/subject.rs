//! 主题命名。
//!
//! 节点 ID 中不应包含 `.`，否则与子主题后缀产生歧义。

const NODE_PREFIX: &str = "node.";
const CHILDREN_SUFFIX: &str = ".children";
const POINTS_SUFFIX: &str = ".points";

/// 已解析的主题。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    /// `node.<id>`：读取节点
    Node(String),
    /// `node.<id>.children`：读取直接子节点
    Children(String),
    /// `node.<id>.points`：向节点写入点批次
    Points(String),
}

impl Subject {
    pub fn parse(subject: &str) -> Option<Self> {
        let rest = subject.strip_prefix(NODE_PREFIX)?;
        let parsed = if let Some(id) = rest.strip_suffix(CHILDREN_SUFFIX) {
            Self::Children(id.to_string())
        } else if let Some(id) = rest.strip_suffix(POINTS_SUFFIX) {
            Self::Points(id.to_string())
        } else {
            Self::Node(rest.to_string())
        };
        if parsed.node_id().is_empty() {
            return None;
        }
        Some(parsed)
    }

    pub fn node_id(&self) -> &str {
        match self {
            Self::Node(id) | Self::Children(id) | Self::Points(id) => id,
        }
    }
}

pub fn node(id: &str) -> String {
    format!("{NODE_PREFIX}{id}")
}

pub fn children(id: &str) -> String {
    format!("{NODE_PREFIX}{id}{CHILDREN_SUFFIX}")
}

pub fn points(id: &str) -> String {
    format!("{NODE_PREFIX}{id}{POINTS_SUFFIX}")
}
