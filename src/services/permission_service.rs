//! 权限检查服务

use std::sync::Arc;

use crate::{
    config::AclConfig, error::AppError, models::principal::Principal, repository::AclStore,
};

/// 管理接口所需的权限键
pub const MANAGE_USERS: &str = "uri://acl/users";
pub const MANAGE_ROLES: &str = "uri://acl/roles";
pub const MANAGE_PERMISSIONS: &str = "uri://acl/permissions";

pub struct PermissionService {
    store: Arc<dyn AclStore>,
    admin_role_id: i64,
    guest_user_id: i64,
}

impl PermissionService {
    pub fn new(store: Arc<dyn AclStore>, acl: &AclConfig) -> Self {
        Self {
            store,
            admin_role_id: acl.admin_role_id,
            guest_user_id: acl.guest_user_id,
        }
    }

    /// 检查用户是否拥有权限
    ///
    /// 任一角色持有键完全相同的权限即返回 true；未知用户或无角色用户返回 false。
    pub async fn can(&self, user_id: i64, key: &str) -> Result<bool, AppError> {
        let allowed = self.store.user_has_permission(user_id, key).await?;

        metrics::counter!(
            "acl_checks_total",
            "result" => if allowed { "allow" } else { "deny" }
        )
        .increment(1);

        tracing::debug!(user_id, key = %key, allowed, "Permission check");
        Ok(allowed)
    }

    /// 检查用户是否是管理员
    pub async fn is_admin(&self, user_id: i64) -> Result<bool, AppError> {
        self.store.user_has_role(user_id, self.admin_role_id).await
    }

    /// 获取用户的全部权限键（排序、去重）
    pub async fn user_permissions(&self, user_id: i64) -> Result<Vec<String>, AppError> {
        self.store.user_permission_keys(user_id).await
    }

    /// 加载用户及其角色、权限快照；用户不存在时返回 None
    pub async fn principal(&self, user_id: i64) -> Result<Option<Principal>, AppError> {
        let Some(user) = self.store.find_user(user_id).await? else {
            return Ok(None);
        };

        let roles = self.store.user_roles(user.id).await?;
        let permissions = self.store.user_permission_keys(user.id).await?;

        Ok(Some(Principal::new(
            user,
            roles,
            permissions,
            self.admin_role_id,
            self.guest_user_id,
        )))
    }

    /// 检查权限，如果无权限则返回错误；管理员直接放行
    pub fn require(&self, principal: &Principal, key: &str) -> Result<(), AppError> {
        if principal.is_admin() || principal.can(key) {
            return Ok(());
        }

        tracing::warn!(
            user_id = principal.id(),
            key = %key,
            "Permission denied"
        );
        Err(AppError::Forbidden)
    }

    /// 仅允许管理员
    pub fn require_admin(&self, principal: &Principal) -> Result<(), AppError> {
        if principal.is_admin() {
            return Ok(());
        }

        tracing::warn!(user_id = principal.id(), "Administrator required");
        Err(AppError::Forbidden)
    }

    /// 修改管理员账户或授予、撤销管理员角色时要求当前身份也是管理员
    pub async fn require_admin_for(
        &self,
        principal: &Principal,
        user_id: i64,
        role_id: Option<i64>,
    ) -> Result<(), AppError> {
        if principal.is_admin() {
            return Ok(());
        }

        if role_id == Some(self.admin_role_id) || self.is_admin(user_id).await? {
            tracing::warn!(
                user_id = principal.id(),
                target_user_id = user_id,
                "Administrator required to manage an administrator"
            );
            return Err(AppError::Forbidden);
        }

        Ok(())
    }
}
