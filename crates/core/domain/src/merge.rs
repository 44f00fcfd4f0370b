//! 点合并引擎。
//!
//! 纯函数：将输入点应用到节点的点集合与派生状态字段上，不做任何 I/O。

use crate::data::{Node, NodeState, POINT_TYPE_NODE_TYPE, POINT_TYPE_PARENT, Point, SwUpdateState};

impl Node {
    /// 合并单个点。
    ///
    /// - `nodeType` / `parent` 元数据点写入 `node_type` / `parent`，不进入点集合
    /// - 其他点按 `(point_type, key)` 替换已有值，不存在则追加
    pub fn process_point(&mut self, point: Point) {
        match point.point_type.as_str() {
            POINT_TYPE_NODE_TYPE => {
                self.node_type = point.text;
                return;
            }
            POINT_TYPE_PARENT => {
                self.parent = point.text;
                return;
            }
            _ => {}
        }

        match self.points.iter_mut().find(|p| p.same_identity(&point)) {
            Some(existing) => *existing = point,
            None => self.points.push(point),
        }
    }

    /// 按顺序合并一批点。
    pub fn process_points(&mut self, points: impl IntoIterator<Item = Point>) {
        for point in points {
            self.process_point(point);
        }
    }

    pub fn set_state(&mut self, state: NodeState) {
        self.state = state;
    }

    pub fn set_cmd_pending(&mut self, pending: bool) {
        self.cmd_pending = pending;
    }

    pub fn set_sw_update_state(&mut self, state: SwUpdateState) {
        self.sw_update_state = state;
    }

    /// 重建节点的复制点流：原有点 + 节点类型点 + （可选）父节点点。
    pub fn replication_points(&self, parent_id: &str) -> Vec<Point> {
        let mut points = self.points.clone();
        points.push(Point::text(POINT_TYPE_NODE_TYPE, self.node_type.clone()));
        if !parent_id.is_empty() {
            points.push(Point::text(POINT_TYPE_PARENT, parent_id));
        }
        points
    }
}
