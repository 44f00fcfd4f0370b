//! 身份仓储：用户、分组与节点可见性
//!
//! 根分组与初始 admin 用户均以 [`ROOT_ID`] 为键；根分组成员可见全部节点，
//! 其余用户仅可见与其所属分组有交集的节点。
//!
//! 口令以明文精确匹配（常量时间比较），未做哈希。用于真实凭据前必须在此边界
//! 引入安全哈希。
//!
//! sled 调用经由 [`Store::run_blocking`] 在阻塞线程池上执行。

use crate::error::StorageError;
use crate::store::{Record, Store};
use crate::traits::{GroupStore, UserStore};
use async_trait::async_trait;
use domain::{Group, Node, ROOT_GROUP_NAME, ROOT_ID, Role, User, UserRoles};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{info, warn};
use uuid::Uuid;

/// 身份仓储
pub struct IdentityRepository {
    store: Arc<Store>,
}

impl IdentityRepository {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// 全量替换记录；键不一致（记录不在其 ID 键下）时删除旧键后重新写入。
    async fn replace_fixing_key<R, F>(&self, id: Uuid, record: R, id_of: F) -> Result<(), StorageError>
    where
        R: Record + Send + 'static,
        F: Fn(&R) -> Uuid + Send + 'static,
    {
        self.store
            .run_blocking(move |store| replace_fixing_key(store, id, &record, id_of))
            .await
    }
}

fn replace_fixing_key<R, F>(store: &Store, id: Uuid, record: &R, id_of: F) -> Result<(), StorageError>
where
    R: Record,
    F: Fn(&R) -> Uuid,
{
    let stale_keys = store
        .keys_where(|stored: &R| id_of(stored) == id)?
        .into_iter()
        .filter(|key| key.as_slice() != id.as_bytes())
        .collect::<Vec<_>>();

    store.transaction(|tx| match tx.update(&id, record) {
        Ok(()) => Ok(()),
        Err(err) if err.is_not_found() => {
            warn!(
                target: "fleet.storage",
                collection = %R::COLLECTION,
                id = %id,
                stale_keys = stale_keys.len(),
                "update missed record key, fixing up"
            );
            for key in &stale_keys {
                tx.delete::<R, _>(key.as_slice())?;
            }
            tx.upsert(&id, record)
        }
        Err(err) => Err(err),
    })
}

fn is_root(store: &Store, user_id: Uuid) -> Result<bool, StorageError> {
    let root: Group = store.get(&ROOT_ID)?;
    Ok(root.has_user(user_id))
}

#[async_trait]
impl UserStore for IdentityRepository {
    async fn users(&self) -> Result<Vec<User>, StorageError> {
        let mut users: Vec<User> = self.store.run_blocking(|store| store.all()).await?;
        users.sort_by_key(|user| user.first_name.to_lowercase());
        Ok(users)
    }

    async fn user(&self, id: Uuid) -> Result<User, StorageError> {
        self.store.run_blocking(move |store| store.get(&id)).await
    }

    async fn user_by_email(&self, email: &str) -> Result<User, StorageError> {
        let email = email.to_string();
        self.store
            .run_blocking(move |store| store.find_one(|user: &User| user.email == email))
            .await
    }

    async fn authenticate(&self, email: &str, pass: &str) -> Result<Option<User>, StorageError> {
        let (email, pass) = (email.to_string(), pass.to_string());
        let mut matches = self
            .store
            .run_blocking(move |store| {
                store.find(|user: &User| {
                    user.email == email && bool::from(user.pass.as_bytes().ct_eq(pass.as_bytes()))
                })
            })
            .await?;
        if matches.is_empty() {
            return Ok(None);
        }
        Ok(Some(matches.swap_remove(0)))
    }

    async fn insert_user(&self, user: User) -> Result<Uuid, StorageError> {
        let user = User {
            id: Uuid::new_v4(),
            ..user
        };
        self.store
            .run_blocking(move |store| {
                store.insert(&user.id, &user)?;
                Ok(user.id)
            })
            .await
    }

    async fn update_user(&self, user: User) -> Result<(), StorageError> {
        self.replace_fixing_key(user.id, user, |stored: &User| stored.id)
            .await
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), StorageError> {
        self.store
            .run_blocking(move |store| store.delete::<User, _>(&id))
            .await
    }
}

#[async_trait]
impl GroupStore for IdentityRepository {
    async fn groups(&self) -> Result<Vec<Group>, StorageError> {
        self.store.run_blocking(|store| store.all()).await
    }

    async fn group(&self, id: Uuid) -> Result<Group, StorageError> {
        self.store.run_blocking(move |store| store.get(&id)).await
    }

    /// 新分组的父分组固定为根分组。
    async fn insert_group(&self, group: Group) -> Result<Uuid, StorageError> {
        let group = Group {
            id: Uuid::new_v4(),
            parent: ROOT_ID,
            ..group
        };
        self.store
            .run_blocking(move |store| {
                store.insert(&group.id, &group)?;
                Ok(group.id)
            })
            .await
    }

    async fn update_group(&self, group: Group) -> Result<(), StorageError> {
        self.replace_fixing_key(group.id, group, |stored: &Group| stored.id)
            .await
    }

    async fn delete_group(&self, id: Uuid) -> Result<(), StorageError> {
        self.store
            .run_blocking(move |store| store.delete::<Group, _>(&id))
            .await
    }

    async fn users_for_group(&self, id: Uuid) -> Result<Vec<User>, StorageError> {
        self.store
            .run_blocking(move |store| {
                store.transaction(|tx| {
                    let group: Group = tx.get(&id)?;
                    group
                        .users
                        .iter()
                        .map(|member| tx.get::<User, _>(&member.user_id))
                        .collect()
                })
            })
            .await
    }

    async fn is_root(&self, user_id: Uuid) -> Result<bool, StorageError> {
        self.store
            .run_blocking(move |store| is_root(store, user_id))
            .await
    }

    async fn nodes_for_user(&self, user_id: Uuid) -> Result<Vec<Node>, StorageError> {
        self.store
            .run_blocking(move |store| {
                if is_root(store, user_id)? {
                    return store.all();
                }

                let group_ids: Vec<Uuid> = store
                    .find(|group: &Group| group.has_user(user_id))?
                    .into_iter()
                    .map(|group| group.id)
                    .collect();
                if group_ids.is_empty() {
                    return Ok(Vec::new());
                }
                store.find(|node: &Node| node.in_any_group(&group_ids))
            })
            .await
    }

    async fn nodes_for_group(&self, group_id: Uuid) -> Result<Vec<Node>, StorageError> {
        self.store
            .run_blocking(move |store| store.find(|node: &Node| node.groups.contains(&group_id)))
            .await
    }

    async fn initialize(&self) -> Result<(), StorageError> {
        let existing = self
            .store
            .run_blocking(|store| store.find_one(|group: &Group| group.name == ROOT_GROUP_NAME))
            .await;
        match existing {
            Ok(_) => return Ok(()),
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err),
        }

        let admin = User {
            id: ROOT_ID,
            first_name: "admin".to_string(),
            last_name: "user".to_string(),
            email: "admin@admin.com".to_string(),
            pass: "admin".to_string(),
        };
        let root = Group {
            id: ROOT_ID,
            name: ROOT_GROUP_NAME.to_string(),
            parent: ROOT_ID,
            users: vec![UserRoles {
                user_id: admin.id,
                roles: vec![Role::Admin],
            }],
        };

        let admin_email = admin.email.clone();
        self.store
            .run_blocking(move |store| {
                store.transaction(|tx| {
                    tx.insert(&admin.id, &admin)?;
                    tx.insert(&root.id, &root)
                })
            })
            .await?;
        info!(
            target: "fleet.storage",
            admin_email = %admin_email,
            "created root group and admin user"
        );
        Ok(())
    }
}
