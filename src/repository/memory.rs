//! 内存存储
//! 与 PostgreSQL 实现保持同样的唯一性、关联与删除约束

use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;

use super::{AclStore, PermissionStore, RoleStore, UserStore};
use crate::{
    error::AppError,
    models::{
        permission::{NewPermission, Permission},
        role::{NewRole, Role},
        user::{User, UserRow},
    },
};

#[derive(Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    roles: BTreeMap<i64, Role>,
    permissions: BTreeMap<i64, Permission>,
    user_roles: BTreeSet<(i64, i64)>,
    role_permissions: BTreeSet<(i64, i64)>,
    next_user_id: i64,
    next_role_id: i64,
    next_permission_id: i64,
}

impl Tables {
    fn next_id(counter: &mut i64) -> i64 {
        *counter += 1;
        *counter
    }

    fn username_taken(&self, username: &str, except: Option<i64>) -> bool {
        self.users
            .values()
            .any(|u| u.username == username && Some(u.id) != except)
    }

    fn role_name_taken(&self, name: &str, except: Option<i64>) -> bool {
        self.roles
            .values()
            .any(|r| r.name == name && Some(r.id) != except)
    }

    fn permission_key_taken(&self, key: &str, except: Option<i64>) -> bool {
        self.permissions
            .values()
            .any(|p| p.key == key && Some(p.id) != except)
    }

    fn role_ids_of(&self, user_id: i64) -> impl Iterator<Item = i64> + '_ {
        self.user_roles
            .iter()
            .filter(move |(u, _)| *u == user_id)
            .map(|(_, r)| *r)
    }

    fn permission_ids_of(&self, role_id: i64) -> impl Iterator<Item = i64> + '_ {
        self.role_permissions
            .iter()
            .filter(move |(r, _)| *r == role_id)
            .map(|(_, p)| *p)
    }

    fn effective_keys(&self, user_id: i64) -> BTreeSet<String> {
        self.role_ids_of(user_id)
            .flat_map(|role_id| self.permission_ids_of(role_id))
            .filter_map(|pid| self.permissions.get(&pid))
            .map(|p| p.key.clone())
            .collect()
    }
}

fn conflict(what: &str) -> AppError {
    AppError::Conflict(what.to_string())
}

/// 进程内 ACL 存储
#[derive(Default)]
pub struct MemoryAclStore {
    tables: RwLock<Tables>,
}

impl MemoryAclStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 与迁移脚本相同的初始数据：访客用户 1、管理员角色 1
    pub fn seeded() -> Self {
        let now = Utc::now();
        let mut tables = Tables::default();

        let guest_id = Tables::next_id(&mut tables.next_user_id);
        tables.users.insert(
            guest_id,
            User {
                id: guest_id,
                username: "guest".to_string(),
                email: "guest@example.invalid".to_string(),
                password_hash: "!".to_string(),
                is_active: true,
                meta: Json(serde_json::json!({})),
                created_at: now,
                updated_at: now,
            },
        );

        let admin_id = Tables::next_id(&mut tables.next_role_id);
        tables.roles.insert(
            admin_id,
            Role {
                id: admin_id,
                name: "admin".to_string(),
                description: Some("Full access to the ACL".to_string()),
                created_at: now,
                updated_at: now,
            },
        );

        Self {
            tables: RwLock::new(tables),
        }
    }
}

#[async_trait]
impl UserStore for MemoryAclStore {
    async fn find_user(&self, id: i64) -> Result<Option<User>, AppError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.username == username).cloned())
    }

    async fn list_users(&self, limit: i64, offset: i64) -> Result<Vec<User>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn insert_user(&self, row: &UserRow) -> Result<User, AppError> {
        let mut tables = self.tables.write().await;
        if tables.username_taken(&row.username, None) {
            return Err(conflict("username already exists"));
        }

        let now = Utc::now();
        let user = User {
            id: Tables::next_id(&mut tables.next_user_id),
            username: row.username.clone(),
            email: row.email.clone(),
            password_hash: row.password_hash.clone(),
            is_active: row.is_active,
            meta: Json(row.meta.clone()),
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn update_user(&self, user: &User) -> Result<Option<User>, AppError> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user.id) {
            return Ok(None);
        }
        if tables.username_taken(&user.username, Some(user.id)) {
            return Err(conflict("username already exists"));
        }

        let Some(stored) = tables.users.get_mut(&user.id) else {
            return Ok(None);
        };
        stored.username = user.username.clone();
        stored.email = user.email.clone();
        stored.is_active = user.is_active;
        stored.meta = user.meta.clone();
        stored.updated_at = Utc::now();

        Ok(Some(stored.clone()))
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        match tables.users.get_mut(&id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_user(&self, id: i64) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        if tables.user_roles.iter().any(|(u, _)| *u == id) {
            return Err(conflict("user still has roles attached"));
        }
        Ok(tables.users.remove(&id).is_some())
    }

    async fn user_roles(&self, user_id: i64) -> Result<Vec<Role>, AppError> {
        let tables = self.tables.read().await;
        let mut roles: Vec<Role> = tables
            .role_ids_of(user_id)
            .filter_map(|id| tables.roles.get(&id).cloned())
            .collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn attach_role(&self, user_id: i64, role_id: i64) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user_id) || !tables.roles.contains_key(&role_id) {
            return Err(conflict("user or role does not exist"));
        }
        Ok(tables.user_roles.insert((user_id, role_id)))
    }

    async fn detach_role(&self, user_id: i64, role_id: i64) -> Result<bool, AppError> {
        Ok(self.tables.write().await.user_roles.remove(&(user_id, role_id)))
    }

    async fn user_has_role(&self, user_id: i64, role_id: i64) -> Result<bool, AppError> {
        Ok(self.tables.read().await.user_roles.contains(&(user_id, role_id)))
    }

    async fn user_permission_keys(&self, user_id: i64) -> Result<Vec<String>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.effective_keys(user_id).into_iter().collect())
    }

    async fn user_has_permission(&self, user_id: i64, key: &str) -> Result<bool, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.effective_keys(user_id).contains(key))
    }
}

#[async_trait]
impl RoleStore for MemoryAclStore {
    async fn find_role(&self, id: i64) -> Result<Option<Role>, AppError> {
        Ok(self.tables.read().await.roles.get(&id).cloned())
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.roles.values().find(|r| r.name == name).cloned())
    }

    async fn list_roles(&self) -> Result<Vec<Role>, AppError> {
        let mut roles: Vec<Role> = self.tables.read().await.roles.values().cloned().collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn insert_role(&self, role: &NewRole) -> Result<Role, AppError> {
        let mut tables = self.tables.write().await;
        if tables.role_name_taken(&role.name, None) {
            return Err(conflict("role name already exists"));
        }

        let now = Utc::now();
        let role = Role {
            id: Tables::next_id(&mut tables.next_role_id),
            name: role.name.clone(),
            description: role.description.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.roles.insert(role.id, role.clone());

        Ok(role)
    }

    async fn update_role(&self, role: &Role) -> Result<Option<Role>, AppError> {
        let mut tables = self.tables.write().await;
        if !tables.roles.contains_key(&role.id) {
            return Ok(None);
        }
        if tables.role_name_taken(&role.name, Some(role.id)) {
            return Err(conflict("role name already exists"));
        }

        let Some(stored) = tables.roles.get_mut(&role.id) else {
            return Ok(None);
        };
        stored.name = role.name.clone();
        stored.description = role.description.clone();
        stored.updated_at = Utc::now();

        Ok(Some(stored.clone()))
    }

    async fn delete_role(&self, id: i64) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        if tables.user_roles.iter().any(|(_, r)| *r == id)
            || tables.role_permissions.iter().any(|(r, _)| *r == id)
        {
            return Err(conflict("role is still referenced"));
        }
        Ok(tables.roles.remove(&id).is_some())
    }

    async fn role_permissions(&self, role_id: i64) -> Result<Vec<Permission>, AppError> {
        let tables = self.tables.read().await;
        let mut permissions: Vec<Permission> = tables
            .permission_ids_of(role_id)
            .filter_map(|id| tables.permissions.get(&id).cloned())
            .collect();
        permissions.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(permissions)
    }

    async fn attach_permission(&self, role_id: i64, permission_id: i64) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        if !tables.roles.contains_key(&role_id) || !tables.permissions.contains_key(&permission_id)
        {
            return Err(conflict("role or permission does not exist"));
        }
        Ok(tables.role_permissions.insert((role_id, permission_id)))
    }

    async fn detach_permission(&self, role_id: i64, permission_id: i64) -> Result<bool, AppError> {
        Ok(self
            .tables
            .write()
            .await
            .role_permissions
            .remove(&(role_id, permission_id)))
    }
}

#[async_trait]
impl PermissionStore for MemoryAclStore {
    async fn find_permission(&self, id: i64) -> Result<Option<Permission>, AppError> {
        Ok(self.tables.read().await.permissions.get(&id).cloned())
    }

    async fn find_permission_by_key(&self, key: &str) -> Result<Option<Permission>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.permissions.values().find(|p| p.key == key).cloned())
    }

    async fn list_permissions(&self) -> Result<Vec<Permission>, AppError> {
        let mut permissions: Vec<Permission> =
            self.tables.read().await.permissions.values().cloned().collect();
        permissions.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(permissions)
    }

    async fn insert_permission(
        &self,
        permission: &NewPermission,
    ) -> Result<Permission, AppError> {
        let mut tables = self.tables.write().await;
        if tables.permission_key_taken(&permission.key, None) {
            return Err(conflict("permission key already exists"));
        }

        let now = Utc::now();
        let permission = Permission {
            id: Tables::next_id(&mut tables.next_permission_id),
            key: permission.key.clone(),
            description: permission.description.clone(),
            group: permission.group.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.permissions.insert(permission.id, permission.clone());

        Ok(permission)
    }

    async fn update_permission(
        &self,
        permission: &Permission,
    ) -> Result<Option<Permission>, AppError> {
        let mut tables = self.tables.write().await;
        if !tables.permissions.contains_key(&permission.id) {
            return Ok(None);
        }
        if tables.permission_key_taken(&permission.key, Some(permission.id)) {
            return Err(conflict("permission key already exists"));
        }

        let Some(stored) = tables.permissions.get_mut(&permission.id) else {
            return Ok(None);
        };
        stored.key = permission.key.clone();
        stored.description = permission.description.clone();
        stored.group = permission.group.clone();
        stored.updated_at = Utc::now();

        Ok(Some(stored.clone()))
    }

    async fn delete_permission(&self, id: i64) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        if tables.role_permissions.iter().any(|(_, p)| *p == id) {
            return Err(conflict("permission is still granted to a role"));
        }
        Ok(tables.permissions.remove(&id).is_some())
    }
}

#[async_trait]
impl AclStore for MemoryAclStore {
    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}
