//! # Fleet Storage 模块
//!
//! 设备树的权威状态存储：基于 sled 的事务型键值存储，以及构建在其上的仓储。
//!
//! ## 架构设计
//!
//! 1. **存储层** (`store.rs`)：五个集合（nodes/users/groups/rules/commands）的
//!    get/insert/update/upsert/delete/find/for_each 与事务原语
//! 2. **接口抽象层** (`traits.rs`)：仓储的异步 Trait 接口
//! 3. **节点仓储** (`node.rs`)：节点、点、命令、规则，含跨记录一致性维护
//! 4. **身份仓储** (`identity.rs`)：用户、分组、根分组判定与节点可见性
//! 5. **时序写入** (`timeseries.rs`, `redis.rs`)：尽力而为的点转发
//! 6. **导出** (`dump.rs`)：全库 JSON 导出
//!
//! ## 一致性
//!
//! 仓储不引入自己的锁；多记录不变量（命令 ⇔ pending 标志、节点 rules ⇔ 规则）
//! 全部通过把相关记录放进同一个 [`Store::transaction`] 来保证。
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! use fleet_storage::{NodeRepository, NodeStore, Store};
//! use domain::Point;
//! use std::sync::Arc;
//!
//! let store = Arc::new(Store::open("./data", Some(500))?);
//! let nodes = NodeRepository::new(store);
//! nodes.apply_point("dev-1", Point::new("temp", 21.5)).await?;
//! ```

pub mod dump;
pub mod error;
pub mod identity;
pub mod node;
pub mod redis;
pub mod store;
pub mod timeseries;
pub mod traits;

pub use dump::{StoreDump, collect_dump, dump};
pub use error::*;
pub use identity::IdentityRepository;
pub use node::NodeRepository;
pub use redis::RedisSink;
pub use store::{Collection, Record, Store, StoreKey, StoreTx};
pub use timeseries::{InMemorySink, NoopSink, TimeSeriesSink};
pub use traits::*;
