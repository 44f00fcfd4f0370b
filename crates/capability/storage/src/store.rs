//! 持久化存储（sled）
//!
//! 五个逻辑集合各占一棵 sled tree：
//! - `nodes` / `commands`：键为节点 ID（UTF-8）
//! - `users` / `groups` / `rules`：键为 UUID 的 16 字节
//!
//! 记录以 serde_json 文档存放。唯一能直接访问持久化数据的组件；
//! 仓储层全部经由 [`Store`] 与 [`StoreTx`] 访问。
//!
//! 事务通过 [`Store::transaction`] 执行：闭包返回 `Ok` 才提交，
//! 返回任何错误都会整体回滚，并把该错误原样返回给调用者。
//! sled 事务内不支持遍历，谓词查询（`find` 等）读取的是已提交状态。

use crate::error::StorageError;
use domain::{Command, Group, Node, Rule, User};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sled::transaction::{ConflictableTransactionError, TransactionError, TransactionalTree};
use sled::{Transactional, Tree};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// 逻辑集合。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Nodes,
    Users,
    Groups,
    Rules,
    Commands,
}

impl Collection {
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Nodes => "nodes",
            Collection::Users => "users",
            Collection::Groups => "groups",
            Collection::Rules => "rules",
            Collection::Commands => "commands",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 可存储记录：绑定记录类型与其所属集合。
pub trait Record: Serialize + DeserializeOwned {
    const COLLECTION: Collection;
}

impl Record for Node {
    const COLLECTION: Collection = Collection::Nodes;
}

impl Record for User {
    const COLLECTION: Collection = Collection::Users;
}

impl Record for Group {
    const COLLECTION: Collection = Collection::Groups;
}

impl Record for Rule {
    const COLLECTION: Collection = Collection::Rules;
}

impl Record for Command {
    const COLLECTION: Collection = Collection::Commands;
}

/// 记录主键到存储键字节的转换。
pub trait StoreKey {
    fn key_bytes(&self) -> Vec<u8>;

    /// 用于错误信息的可读形式。
    fn key_display(&self) -> String;
}

impl StoreKey for str {
    fn key_bytes(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    fn key_display(&self) -> String {
        self.to_string()
    }
}

impl StoreKey for String {
    fn key_bytes(&self) -> Vec<u8> {
        self.as_str().key_bytes()
    }

    fn key_display(&self) -> String {
        self.clone()
    }
}

impl StoreKey for Uuid {
    fn key_bytes(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    fn key_display(&self) -> String {
        self.to_string()
    }
}

impl StoreKey for [u8] {
    fn key_bytes(&self) -> Vec<u8> {
        self.to_vec()
    }

    fn key_display(&self) -> String {
        match Uuid::from_slice(self) {
            Ok(id) => id.to_string(),
            Err(_) => String::from_utf8_lossy(self).into_owned(),
        }
    }
}

fn encode<R: Record>(record: &R) -> Result<Vec<u8>, StorageError> {
    Ok(serde_json::to_vec(record)?)
}

fn decode<R: Record>(bytes: &[u8]) -> Result<R, StorageError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// 文件型事务存储。
pub struct Store {
    db: sled::Db,
    nodes: Tree,
    users: Tree,
    groups: Tree,
    rules: Tree,
    commands: Tree,
}

impl Store {
    /// 打开（或创建）目录下的存储。
    pub fn open(path: impl AsRef<Path>, flush_every_ms: Option<u64>) -> Result<Self, StorageError> {
        let db = sled::Config::new()
            .path(path)
            .flush_every_ms(flush_every_ms)
            .open()?;
        Self::from_db(db)
    }

    /// 临时存储（进程退出即删除，用于测试）。
    pub fn temporary() -> Result<Self, StorageError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self, StorageError> {
        Ok(Self {
            nodes: db.open_tree(Collection::Nodes.name())?,
            users: db.open_tree(Collection::Users.name())?,
            groups: db.open_tree(Collection::Groups.name())?,
            rules: db.open_tree(Collection::Rules.name())?,
            commands: db.open_tree(Collection::Commands.name())?,
            db,
        })
    }

    fn tree(&self, collection: Collection) -> &Tree {
        match collection {
            Collection::Nodes => &self.nodes,
            Collection::Users => &self.users,
            Collection::Groups => &self.groups,
            Collection::Rules => &self.rules,
            Collection::Commands => &self.commands,
        }
    }

    /// 在阻塞线程池上执行同步存储操作，避免占用异步运行时的工作线程。
    pub async fn run_blocking<T, F>(self: &Arc<Self>, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&Store) -> Result<T, StorageError> + Send + 'static,
    {
        let store = Arc::clone(self);
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|err| StorageError::Backend(format!("blocking task failed: {err}")))?
    }

    /// 将脏数据刷到磁盘。
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }

    pub fn get<R: Record, K: StoreKey + ?Sized>(&self, key: &K) -> Result<R, StorageError> {
        self.try_get(key)?
            .ok_or_else(|| StorageError::not_found(R::COLLECTION, key.key_display()))
    }

    pub fn try_get<R: Record, K: StoreKey + ?Sized>(
        &self,
        key: &K,
    ) -> Result<Option<R>, StorageError> {
        match self.tree(R::COLLECTION).get(key.key_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// 按存储顺序遍历整个集合，回调首次出错即停止并返回该错误。
    pub fn for_each<R, F>(&self, mut callback: F) -> Result<(), StorageError>
    where
        R: Record,
        F: FnMut(R) -> Result<(), StorageError>,
    {
        for item in self.tree(R::COLLECTION).iter() {
            let (_, bytes) = item?;
            callback(decode(&bytes)?)?;
        }
        Ok(())
    }

    pub fn find<R, P>(&self, predicate: P) -> Result<Vec<R>, StorageError>
    where
        R: Record,
        P: Fn(&R) -> bool,
    {
        let mut found = Vec::new();
        self.for_each(|record: R| {
            if predicate(&record) {
                found.push(record);
            }
            Ok(())
        })?;
        Ok(found)
    }

    /// 返回首个满足谓词的记录，不存在时返回 NotFound。
    pub fn find_one<R, P>(&self, predicate: P) -> Result<R, StorageError>
    where
        R: Record,
        P: Fn(&R) -> bool,
    {
        for item in self.tree(R::COLLECTION).iter() {
            let (_, bytes) = item?;
            let record: R = decode(&bytes)?;
            if predicate(&record) {
                return Ok(record);
            }
        }
        Err(StorageError::not_found(R::COLLECTION, "<query>"))
    }

    pub fn all<R: Record>(&self) -> Result<Vec<R>, StorageError> {
        self.find(|_: &R| true)
    }

    /// 返回满足谓词的记录所在的存储键。
    pub fn keys_where<R, P>(&self, predicate: P) -> Result<Vec<Vec<u8>>, StorageError>
    where
        R: Record,
        P: Fn(&R) -> bool,
    {
        let mut keys = Vec::new();
        for item in self.tree(R::COLLECTION).iter() {
            let (key, bytes) = item?;
            let record: R = decode(&bytes)?;
            if predicate(&record) {
                keys.push(key.to_vec());
            }
        }
        Ok(keys)
    }

    pub fn insert<R: Record, K: StoreKey + ?Sized>(
        &self,
        key: &K,
        record: &R,
    ) -> Result<(), StorageError> {
        self.transaction(|tx| tx.insert(key, record))
    }

    pub fn update<R: Record, K: StoreKey + ?Sized>(
        &self,
        key: &K,
        record: &R,
    ) -> Result<(), StorageError> {
        self.transaction(|tx| tx.update(key, record))
    }

    pub fn upsert<R: Record, K: StoreKey + ?Sized>(
        &self,
        key: &K,
        record: &R,
    ) -> Result<(), StorageError> {
        self.transaction(|tx| tx.upsert(key, record))
    }

    pub fn delete<R: Record, K: StoreKey + ?Sized>(&self, key: &K) -> Result<(), StorageError> {
        self.transaction(|tx| tx.delete::<R, K>(key))
    }

    /// 删除满足谓词的全部记录，返回删除条数。
    pub fn delete_matching<R, P>(&self, predicate: P) -> Result<usize, StorageError>
    where
        R: Record,
        P: Fn(&R) -> bool,
    {
        let keys = self.keys_where(predicate)?;
        self.transaction(|tx| {
            for key in &keys {
                tx.delete::<R, _>(key.as_slice())?;
            }
            Ok(keys.len())
        })
    }

    /// 在单个事务中执行 `f`。
    ///
    /// 闭包可能因写冲突被 sled 重复执行，因此不得有事务外副作用。
    pub fn transaction<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        F: Fn(&StoreTx<'_>) -> Result<T, StorageError>,
    {
        let trees = (
            &self.nodes,
            &self.users,
            &self.groups,
            &self.rules,
            &self.commands,
        );
        let result = trees.transaction(|(nodes, users, groups, rules, commands)| {
            let tx = StoreTx {
                nodes,
                users,
                groups,
                rules,
                commands,
            };
            f(&tx).map_err(|err| match err {
                StorageError::Conflict(inner) => ConflictableTransactionError::from(inner),
                other => ConflictableTransactionError::Abort(other),
            })
        });
        result.map_err(|err| match err {
            TransactionError::Abort(err) => err,
            TransactionError::Storage(err) => StorageError::from(err),
        })
    }
}

/// 事务作用域句柄。
///
/// 通过它发出的写入仅在事务闭包成功返回后生效。
pub struct StoreTx<'a> {
    nodes: &'a TransactionalTree,
    users: &'a TransactionalTree,
    groups: &'a TransactionalTree,
    rules: &'a TransactionalTree,
    commands: &'a TransactionalTree,
}

impl StoreTx<'_> {
    fn tree(&self, collection: Collection) -> &TransactionalTree {
        match collection {
            Collection::Nodes => self.nodes,
            Collection::Users => self.users,
            Collection::Groups => self.groups,
            Collection::Rules => self.rules,
            Collection::Commands => self.commands,
        }
    }

    pub fn get<R: Record, K: StoreKey + ?Sized>(&self, key: &K) -> Result<R, StorageError> {
        self.try_get(key)?
            .ok_or_else(|| StorageError::not_found(R::COLLECTION, key.key_display()))
    }

    pub fn try_get<R: Record, K: StoreKey + ?Sized>(
        &self,
        key: &K,
    ) -> Result<Option<R>, StorageError> {
        match self.tree(R::COLLECTION).get(key.key_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn contains<R: Record, K: StoreKey + ?Sized>(&self, key: &K) -> Result<bool, StorageError> {
        Ok(self.tree(R::COLLECTION).get(key.key_bytes())?.is_some())
    }

    /// 插入新记录，已存在时失败。
    pub fn insert<R: Record, K: StoreKey + ?Sized>(
        &self,
        key: &K,
        record: &R,
    ) -> Result<(), StorageError> {
        if self.contains::<R, K>(key)? {
            return Err(StorageError::AlreadyExists {
                collection: R::COLLECTION,
                key: key.key_display(),
            });
        }
        self.upsert(key, record)
    }

    /// 更新已有记录，不存在时失败。
    pub fn update<R: Record, K: StoreKey + ?Sized>(
        &self,
        key: &K,
        record: &R,
    ) -> Result<(), StorageError> {
        if !self.contains::<R, K>(key)? {
            return Err(StorageError::not_found(R::COLLECTION, key.key_display()));
        }
        self.upsert(key, record)
    }

    pub fn upsert<R: Record, K: StoreKey + ?Sized>(
        &self,
        key: &K,
        record: &R,
    ) -> Result<(), StorageError> {
        self.tree(R::COLLECTION)
            .insert(key.key_bytes(), encode(record)?)?;
        Ok(())
    }

    /// 删除记录，不存在时失败。
    pub fn delete<R: Record, K: StoreKey + ?Sized>(&self, key: &K) -> Result<(), StorageError> {
        match self.tree(R::COLLECTION).remove(key.key_bytes())? {
            Some(_) => Ok(()),
            None => Err(StorageError::not_found(R::COLLECTION, key.key_display())),
        }
    }
}
