//! 身份解析服务：会话 -> 当前用户
//!
//! 会话中只保存用户 ID。缺失、格式错误、用户不存在或已停用时回落到访客用户。

use serde_json::{json, Value};
use std::sync::Arc;

use crate::{
    auth::password::PasswordHasher,
    config::AppConfig,
    error::AppError,
    models::principal::Principal,
    repository::AclStore,
    services::permission_service::PermissionService,
    session::SessionStore,
};

pub struct IdentityResolver {
    store: Arc<dyn AclStore>,
    permissions: Arc<PermissionService>,
    hasher: PasswordHasher,
    session_key: String,
    guest_user_id: i64,
}

impl IdentityResolver {
    pub fn new(
        store: Arc<dyn AclStore>,
        permissions: Arc<PermissionService>,
        hasher: PasswordHasher,
        config: &AppConfig,
    ) -> Self {
        Self {
            store,
            permissions,
            hasher,
            session_key: config.session.key.clone(),
            guest_user_id: config.acl.guest_user_id,
        }
    }

    pub fn guest_user_id(&self) -> i64 {
        self.guest_user_id
    }

    /// 解析会话对应的用户
    pub async fn load(&self, session: &dyn SessionStore) -> Result<Principal, AppError> {
        let stored = session.get(&self.session_key).await?;

        if let Some(user_id) = stored.as_ref().and_then(parse_user_id) {
            if let Some(principal) = self.permissions.principal(user_id).await? {
                if principal.user.is_active {
                    return Ok(principal);
                }
                tracing::debug!(user_id, "Session user is inactive, falling back to guest");
            } else {
                tracing::debug!(user_id, "Session user not found, falling back to guest");
            }
        } else if let Some(value) = stored {
            tracing::debug!(value = %value, "Invalid session identity, falling back to guest");
        }

        self.guest().await
    }

    /// 切换会话身份；目标用户不存在时不修改会话
    ///
    /// 写入前更换会话 ID，切换前持有的 Cookie 不会继承新身份。访客始终可切换。
    pub async fn change(
        &self,
        session: &dyn SessionStore,
        user_id: i64,
    ) -> Result<Principal, AppError> {
        let principal = self
            .permissions
            .principal(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("user"))?;

        if !principal.user.is_active && user_id != self.guest_user_id {
            return Err(AppError::BadRequest(format!("user {} is inactive", user_id)));
        }

        session.cycle_id().await?;
        session.set(&self.session_key, json!(user_id)).await?;

        tracing::info!(user_id, "Session identity changed");
        Ok(principal)
    }

    /// 登出：切换回访客
    pub async fn logout(&self, session: &dyn SessionStore) -> Result<Principal, AppError> {
        self.change(session, self.guest_user_id).await
    }

    /// 用户名密码登录
    pub async fn login(
        &self,
        session: &dyn SessionStore,
        username: &str,
        password: &str,
    ) -> Result<Principal, AppError> {
        let user = self
            .store
            .find_user_by_username(username)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !user.is_active || user.id == self.guest_user_id {
            tracing::warn!(user_id = user.id, "Login refused for account");
            return Err(AppError::Unauthorized);
        }

        if let Err(e) = self.hasher.verify(password, &user.password_hash) {
            tracing::warn!(user_id = user.id, "Login failed: wrong password");
            return Err(e);
        }

        self.change(session, user.id).await
    }

    async fn guest(&self) -> Result<Principal, AppError> {
        self.permissions
            .principal(self.guest_user_id)
            .await?
            .ok_or_else(|| {
                tracing::error!(guest_user_id = self.guest_user_id, "Guest user is missing");
                AppError::Config(format!(
                    "guest user {} does not exist",
                    self.guest_user_id
                ))
            })
    }
}

/// 会话值须为正整数，或可解析为正整数的字符串
fn parse_user_id(value: &Value) -> Option<i64> {
    let id = match value {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };

    (id > 0).then_some(id)
}
