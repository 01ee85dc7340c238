//! Database repository layer
//!
//! 存储以 trait 形式暴露，服务层只依赖 `AclStore`。
//! `PgAclStore` 面向 PostgreSQL，`MemoryAclStore` 用于测试与嵌入式场景。
//! 两者约束一致：用户名、角色名、权限键唯一；关联表中同一对只出现一次；
//! 仍被关联的实体不可删除。

pub mod memory;
pub mod permission_repo;
pub mod role_repo;
pub mod user_repo;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::{
    error::AppError,
    models::{
        permission::{NewPermission, Permission},
        role::{NewRole, Role},
        user::{User, UserRow},
    },
};

pub use memory::MemoryAclStore;

/// 用户及用户-角色关联
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user(&self, id: i64) -> Result<Option<User>, AppError>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    async fn list_users(&self, limit: i64, offset: i64) -> Result<Vec<User>, AppError>;

    async fn insert_user(&self, row: &UserRow) -> Result<User, AppError>;

    /// 按 id 写回所有可变字段（密码除外），不存在时返回 None
    async fn update_user(&self, user: &User) -> Result<Option<User>, AppError>;

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<bool, AppError>;

    async fn delete_user(&self, id: i64) -> Result<bool, AppError>;

    /// 用户的角色，按名称排序
    async fn user_roles(&self, user_id: i64) -> Result<Vec<Role>, AppError>;

    /// 关联不存在时插入，返回是否新增了一行
    async fn attach_role(&self, user_id: i64, role_id: i64) -> Result<bool, AppError>;

    async fn detach_role(&self, user_id: i64, role_id: i64) -> Result<bool, AppError>;

    async fn user_has_role(&self, user_id: i64, role_id: i64) -> Result<bool, AppError>;

    /// 用户经由角色获得的权限键，去重并排序
    async fn user_permission_keys(&self, user_id: i64) -> Result<Vec<String>, AppError>;

    async fn user_has_permission(&self, user_id: i64, key: &str) -> Result<bool, AppError>;
}

/// 角色及角色-权限关联
#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn find_role(&self, id: i64) -> Result<Option<Role>, AppError>;

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, AppError>;

    async fn list_roles(&self) -> Result<Vec<Role>, AppError>;

    async fn insert_role(&self, role: &NewRole) -> Result<Role, AppError>;

    async fn update_role(&self, role: &Role) -> Result<Option<Role>, AppError>;

    async fn delete_role(&self, id: i64) -> Result<bool, AppError>;

    /// 角色的权限，按键排序
    async fn role_permissions(&self, role_id: i64) -> Result<Vec<Permission>, AppError>;

    /// 关联不存在时插入，返回是否新增了一行
    async fn attach_permission(&self, role_id: i64, permission_id: i64) -> Result<bool, AppError>;

    async fn detach_permission(&self, role_id: i64, permission_id: i64) -> Result<bool, AppError>;
}

/// 权限
#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn find_permission(&self, id: i64) -> Result<Option<Permission>, AppError>;

    async fn find_permission_by_key(&self, key: &str) -> Result<Option<Permission>, AppError>;

    async fn list_permissions(&self) -> Result<Vec<Permission>, AppError>;

    async fn insert_permission(&self, permission: &NewPermission)
        -> Result<Permission, AppError>;

    async fn update_permission(&self, permission: &Permission)
        -> Result<Option<Permission>, AppError>;

    async fn delete_permission(&self, id: i64) -> Result<bool, AppError>;
}

/// ACL 存储的完整能力集
#[async_trait]
pub trait AclStore: UserStore + RoleStore + PermissionStore {
    /// 就绪检查
    async fn ping(&self) -> Result<(), AppError>;
}

/// PostgreSQL 实现
#[derive(Clone)]
pub struct PgAclStore {
    db: PgPool,
}

impl PgAclStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }
}

#[async_trait]
impl AclStore for PgAclStore {
    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }
}
