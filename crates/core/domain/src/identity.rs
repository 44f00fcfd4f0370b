//! 用户与分组。

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 根分组与初始管理员共用的哨兵标识（全零 UUID）。
///
/// 进程级常量：存储初始化时以此 ID 创建根分组与 admin 用户。
pub const ROOT_ID: Uuid = Uuid::nil();

/// 根分组名称。
pub const ROOT_GROUP_NAME: &str = "root";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

/// 用户记录；`email` 为登录键。
///
/// `pass` 以明文形式保存并精确匹配，未做哈希。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub pass: String,
}

/// 分组成员及其角色。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRoles {
    pub user_id: Uuid,
    #[serde(default)]
    pub roles: Vec<Role>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub parent: Uuid,
    #[serde(default)]
    pub users: Vec<UserRoles>,
}

impl Group {
    pub fn has_user(&self, user_id: Uuid) -> bool {
        self.users.iter().any(|ur| ur.user_id == user_id)
    }

    pub fn has_role(&self, user_id: Uuid, role: Role) -> bool {
        self.users
            .iter()
            .any(|ur| ur.user_id == user_id && ur.roles.contains(&role))
    }
}
