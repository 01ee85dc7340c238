//! ACL 实体服务
//! 用户、角色、权限的增删改查与关联维护；每个写操作先通过规则集校验

use std::sync::Arc;

use crate::{
    auth::password::PasswordHasher,
    config::{AclConfig, BootstrapAdmin, SecurityConfig},
    error::AppError,
    models::{
        permission::{NewPermission, Permission, PERMISSION_RULE_SET},
        role::{NewRole, Role, ROLE_RULE_SET},
        user::{NewUser, PasswordChange, User, UserRow, USER_RULE_SET},
    },
    repository::AclStore,
    validation::{gate, gate_with, EntityKey, FieldError, Operation, RuleSet},
};
use secrecy::ExposeSecret;

pub struct AclService {
    store: Arc<dyn AclStore>,
    hasher: PasswordHasher,
    security: SecurityConfig,
    guest_user_id: i64,
    admin_role_id: i64,
}

impl AclService {
    pub fn new(
        store: Arc<dyn AclStore>,
        hasher: PasswordHasher,
        security: SecurityConfig,
        acl: &AclConfig,
    ) -> Self {
        Self {
            store,
            hasher,
            security,
            guest_user_id: acl.guest_user_id,
            admin_role_id: acl.admin_role_id,
        }
    }

    pub fn store(&self) -> &Arc<dyn AclStore> {
        &self.store
    }

    // ==================== Users ====================

    /// 创建用户
    pub async fn create_user(&self, draft: NewUser) -> Result<User, AppError> {
        let mut extra = Vec::new();
        if !draft.password.is_empty() {
            extra.extend(PasswordHasher::password_policy(&draft.password, &self.security));
        }
        if !draft.username.is_empty()
            && self.store.find_user_by_username(&draft.username).await?.is_some()
        {
            extra.push(unique("username"));
        }
        gate_with(Operation::Create, &draft, extra)?;

        let row = UserRow {
            username: draft.username,
            email: draft.email,
            password_hash: self.hasher.hash(&draft.password)?,
            is_active: draft.is_active,
            meta: draft.meta,
        };
        let user = self.store.insert_user(&row).await?;

        tracing::info!(user_id = user.id, username = %user.username, "User created");
        Ok(user)
    }

    /// 获取用户
    pub async fn get_user(&self, id: i64) -> Result<User, AppError> {
        gate(Operation::Read, &EntityKey::new(USER_RULE_SET, id))?;

        self.store
            .find_user(id)
            .await?
            .ok_or_else(|| AppError::not_found("user"))
    }

    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        self.store.find_user_by_username(username).await
    }

    /// 列出用户
    pub async fn list_users(&self, limit: i64, offset: i64) -> Result<Vec<User>, AppError> {
        self.store.list_users(limit, offset).await
    }

    /// 写回已修改的用户
    pub async fn update_user(&self, user: &User) -> Result<User, AppError> {
        self.update_user_with_password(user, None).await
    }

    /// 写回已修改的用户，并可同时修改密码
    ///
    /// 资料与密码的规则一起校验，任一失败都不写入。
    pub async fn update_user_with_password(
        &self,
        user: &User,
        password: Option<&str>,
    ) -> Result<User, AppError> {
        let mut extra = Vec::new();
        if let Some(existing) = self.store.find_user_by_username(&user.username).await? {
            if existing.id != user.id {
                extra.push(unique("username"));
            }
        }
        if user.id == self.guest_user_id && !user.is_active {
            extra.push(FieldError::new(
                "is_active",
                "guest",
                "the guest user cannot be deactivated",
            ));
        }
        if let Some(password) = password {
            extra.extend(self.password_errors(user.id, password));
        }
        gate_with(Operation::Update, user, extra)?;

        let password_hash = password.map(|p| self.hasher.hash(p)).transpose()?;

        let updated = self
            .store
            .update_user(user)
            .await?
            .ok_or_else(|| AppError::not_found("user"))?;

        if let Some(password_hash) = &password_hash {
            if !self.store.update_password(updated.id, password_hash).await? {
                return Err(AppError::not_found("user"));
            }
            tracing::info!(user_id = updated.id, "Password changed");
        }

        tracing::info!(user_id = updated.id, "User updated");
        Ok(updated)
    }

    /// 修改密码
    pub async fn set_password(&self, id: i64, password: &str) -> Result<(), AppError> {
        let change = PasswordChange {
            id,
            password: password.to_string(),
        };
        let extra = if password.is_empty() {
            Vec::new()
        } else {
            PasswordHasher::password_policy(password, &self.security)
        };
        gate_with(Operation::Update, &change, extra)?;

        let password_hash = self.hasher.hash(password)?;
        if !self.store.update_password(id, &password_hash).await? {
            return Err(AppError::not_found("user"));
        }

        tracing::info!(user_id = id, "Password changed");
        Ok(())
    }

    /// 新密码的字段错误：长度、必填与密码策略
    fn password_errors(&self, id: i64, password: &str) -> Vec<FieldError> {
        let change = PasswordChange {
            id,
            password: password.to_string(),
        };
        let mut errors: Vec<FieldError> = change
            .check(Operation::Update)
            .into_iter()
            .filter(|e| e.field == "password")
            .collect();
        if !password.is_empty() {
            errors.extend(PasswordHasher::password_policy(password, &self.security));
        }
        errors
    }

    /// 删除用户，仍有角色关联时由存储层拒绝
    pub async fn delete_user(&self, id: i64) -> Result<(), AppError> {
        gate(Operation::Delete, &EntityKey::new(USER_RULE_SET, id))?;

        if id == self.guest_user_id {
            return Err(AppError::Conflict("the guest user cannot be deleted".to_string()));
        }

        if !self.store.delete_user(id).await? {
            return Err(AppError::not_found("user"));
        }

        tracing::info!(user_id = id, "User deleted");
        Ok(())
    }

    // ==================== Roles ====================

    /// 创建角色
    pub async fn create_role(&self, draft: NewRole) -> Result<Role, AppError> {
        let mut extra = Vec::new();
        if !draft.name.is_empty() && self.store.find_role_by_name(&draft.name).await?.is_some() {
            extra.push(unique("name"));
        }
        gate_with(Operation::Create, &draft, extra)?;

        let role = self.store.insert_role(&draft).await?;

        tracing::info!(role_id = role.id, name = %role.name, "Role created");
        Ok(role)
    }

    pub async fn get_role(&self, id: i64) -> Result<Role, AppError> {
        gate(Operation::Read, &EntityKey::new(ROLE_RULE_SET, id))?;

        self.store
            .find_role(id)
            .await?
            .ok_or_else(|| AppError::not_found("role"))
    }

    pub async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, AppError> {
        self.store.find_role_by_name(name).await
    }

    pub async fn list_roles(&self) -> Result<Vec<Role>, AppError> {
        self.store.list_roles().await
    }

    /// 写回已修改的角色
    pub async fn update_role(&self, role: &Role) -> Result<Role, AppError> {
        let mut extra = Vec::new();
        if let Some(existing) = self.store.find_role_by_name(&role.name).await? {
            if existing.id != role.id {
                extra.push(unique("name"));
            }
        }
        gate_with(Operation::Update, role, extra)?;

        let updated = self
            .store
            .update_role(role)
            .await?
            .ok_or_else(|| AppError::not_found("role"))?;

        tracing::info!(role_id = updated.id, "Role updated");
        Ok(updated)
    }

    pub async fn delete_role(&self, id: i64) -> Result<(), AppError> {
        gate(Operation::Delete, &EntityKey::new(ROLE_RULE_SET, id))?;

        if id == self.admin_role_id {
            return Err(AppError::Conflict("the admin role cannot be deleted".to_string()));
        }

        if !self.store.delete_role(id).await? {
            return Err(AppError::not_found("role"));
        }

        tracing::info!(role_id = id, "Role deleted");
        Ok(())
    }

    // ==================== Permissions ====================

    /// 创建权限
    pub async fn create_permission(&self, draft: NewPermission) -> Result<Permission, AppError> {
        let mut extra = Vec::new();
        if !draft.key.is_empty() && self.store.find_permission_by_key(&draft.key).await?.is_some()
        {
            extra.push(unique("key"));
        }
        gate_with(Operation::Create, &draft, extra)?;

        let permission = self.store.insert_permission(&draft).await?;

        tracing::info!(
            permission_id = permission.id,
            key = %permission.key,
            "Permission created"
        );
        Ok(permission)
    }

    pub async fn get_permission(&self, id: i64) -> Result<Permission, AppError> {
        gate(Operation::Read, &EntityKey::new(PERMISSION_RULE_SET, id))?;

        self.store
            .find_permission(id)
            .await?
            .ok_or_else(|| AppError::not_found("permission"))
    }

    pub async fn find_permission_by_key(&self, key: &str) -> Result<Option<Permission>, AppError> {
        self.store.find_permission_by_key(key).await
    }

    pub async fn list_permissions(&self) -> Result<Vec<Permission>, AppError> {
        self.store.list_permissions().await
    }

    /// 写回已修改的权限
    pub async fn update_permission(&self, permission: &Permission) -> Result<Permission, AppError> {
        let mut extra = Vec::new();
        if let Some(existing) = self.store.find_permission_by_key(&permission.key).await? {
            if existing.id != permission.id {
                extra.push(unique("key"));
            }
        }
        gate_with(Operation::Update, permission, extra)?;

        let updated = self
            .store
            .update_permission(permission)
            .await?
            .ok_or_else(|| AppError::not_found("permission"))?;

        tracing::info!(permission_id = updated.id, key = %updated.key, "Permission updated");
        Ok(updated)
    }

    pub async fn delete_permission(&self, id: i64) -> Result<(), AppError> {
        gate(Operation::Delete, &EntityKey::new(PERMISSION_RULE_SET, id))?;

        if !self.store.delete_permission(id).await? {
            return Err(AppError::not_found("permission"));
        }

        tracing::info!(permission_id = id, "Permission deleted");
        Ok(())
    }

    // ==================== Associations ====================

    /// 为角色添加权限，已存在时不重复插入；返回是否新增
    ///
    /// 单条语句写入，不与其他写操作组成事务。
    pub async fn add_permission(&self, role_id: i64, permission_id: i64) -> Result<bool, AppError> {
        let role = self.get_role(role_id).await?;
        let permission = self.get_permission(permission_id).await?;

        let added = self.store.attach_permission(role.id, permission.id).await?;

        tracing::info!(
            role_id,
            permission_id,
            key = %permission.key,
            added,
            "Permission granted to role"
        );
        Ok(added)
    }

    /// 从角色移除权限；返回是否移除了关联
    pub async fn remove_permission(
        &self,
        role_id: i64,
        permission_id: i64,
    ) -> Result<bool, AppError> {
        gate(Operation::Update, &EntityKey::new(ROLE_RULE_SET, role_id))?;
        gate(Operation::Read, &EntityKey::new(PERMISSION_RULE_SET, permission_id))?;

        let removed = self.store.detach_permission(role_id, permission_id).await?;

        tracing::info!(role_id, permission_id, removed, "Permission revoked from role");
        Ok(removed)
    }

    /// 为用户分配角色，已存在时不重复插入；返回是否新增
    pub async fn add_role(&self, user_id: i64, role_id: i64) -> Result<bool, AppError> {
        let user = self.get_user(user_id).await?;
        let role = self.get_role(role_id).await?;

        let added = self.store.attach_role(user.id, role.id).await?;

        tracing::info!(user_id, role_id, role = %role.name, added, "Role assigned to user");
        Ok(added)
    }

    /// 撤销用户的角色；返回是否移除了关联
    pub async fn remove_role(&self, user_id: i64, role_id: i64) -> Result<bool, AppError> {
        gate(Operation::Update, &EntityKey::new(USER_RULE_SET, user_id))?;
        gate(Operation::Read, &EntityKey::new(ROLE_RULE_SET, role_id))?;

        let removed = self.store.detach_role(user_id, role_id).await?;

        tracing::info!(user_id, role_id, removed, "Role revoked from user");
        Ok(removed)
    }

    pub async fn user_roles(&self, user_id: i64) -> Result<Vec<Role>, AppError> {
        let user = self.get_user(user_id).await?;
        self.store.user_roles(user.id).await
    }

    pub async fn role_permissions(&self, role_id: i64) -> Result<Vec<Permission>, AppError> {
        let role = self.get_role(role_id).await?;
        self.store.role_permissions(role.id).await
    }

    // ==================== Bootstrap ====================

    /// 确保初始管理员存在并拥有管理员角色
    pub async fn ensure_admin(&self, admin: &BootstrapAdmin) -> Result<User, AppError> {
        let user = match self.store.find_user_by_username(&admin.username).await? {
            Some(user) => user,
            None => {
                self.create_user(NewUser::new(
                    &admin.username,
                    &admin.email,
                    admin.password.expose_secret(),
                ))
                .await?
            }
        };

        if self.add_role(user.id, self.admin_role_id).await? {
            tracing::info!(user_id = user.id, "Bootstrap administrator granted admin role");
        }

        Ok(user)
    }
}

fn unique(field: &str) -> FieldError {
    FieldError::new(field, "unique", format!("{} is already taken", field))
}
