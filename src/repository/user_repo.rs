//! User repository (用户数据访问)

use async_trait::async_trait;
use sqlx::types::Json;

use super::{PgAclStore, UserStore};
use crate::{
    error::AppError,
    models::{
        role::Role,
        user::{User, UserRow},
    },
};

#[async_trait]
impl UserStore for PgAclStore {
    /// 根据 ID 查找用户
    async fn find_user(&self, id: i64) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;

        Ok(user)
    }

    /// 根据用户名查找用户
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(self.pool())
            .await?;

        Ok(user)
    }

    /// 列出用户
    async fn list_users(&self, limit: i64, offset: i64) -> Result<Vec<User>, AppError> {
        let users =
            sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY id LIMIT $1 OFFSET $2")
                .bind(limit)
                .bind(offset)
                .fetch_all(self.pool())
                .await?;

        Ok(users)
    }

    /// 创建用户
    async fn insert_user(&self, row: &UserRow) -> Result<User, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password_hash, is_active, meta)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&row.username)
        .bind(&row.email)
        .bind(&row.password_hash)
        .bind(row.is_active)
        .bind(Json(&row.meta))
        .fetch_one(self.pool())
        .await?;

        Ok(user)
    }

    /// 更新用户
    async fn update_user(&self, user: &User) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET
                username = $2,
                email = $3,
                is_active = $4,
                meta = $5,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(user.is_active)
        .bind(&user.meta)
        .fetch_optional(self.pool())
        .await?;

        Ok(user)
    }

    /// 更新密码
    async fn update_password(&self, id: i64, password_hash: &str) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// 删除用户（仍有角色关联时由外键拒绝）
    async fn delete_user(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // ==================== User Roles ====================

    /// 获取用户的角色
    async fn user_roles(&self, user_id: i64) -> Result<Vec<Role>, AppError> {
        let roles = sqlx::query_as::<_, Role>(
            r#"
            SELECT r.*
            FROM roles r
            JOIN user_roles ur ON ur.role_id = r.id
            WHERE ur.user_id = $1
            ORDER BY r.name
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;

        Ok(roles)
    }

    /// 为用户分配角色
    async fn attach_role(&self, user_id: i64, role_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query(
            "INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(role_id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// 撤销用户的角色
    async fn detach_role(&self, user_id: i64, role_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND role_id = $2")
            .bind(user_id)
            .bind(role_id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn user_has_role(&self, user_id: i64, role_id: i64) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM user_roles WHERE user_id = $1 AND role_id = $2)",
        )
        .bind(user_id)
        .bind(role_id)
        .fetch_one(self.pool())
        .await?;

        Ok(exists)
    }

    // ==================== Effective Permissions ====================

    async fn user_permission_keys(&self, user_id: i64) -> Result<Vec<String>, AppError> {
        let keys: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT p.key
            FROM permissions p
            JOIN role_permissions rp ON rp.permission_id = p.id
            JOIN user_roles ur ON ur.role_id = rp.role_id
            WHERE ur.user_id = $1
            ORDER BY p.key
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;

        Ok(keys)
    }

    /// 检查用户是否经由任一角色拥有该权限键（区分大小写的精确匹配）
    async fn user_has_permission(&self, user_id: i64, key: &str) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1
                FROM user_roles ur
                JOIN role_permissions rp ON rp.role_id = ur.role_id
                JOIN permissions p ON p.id = rp.permission_id
                WHERE ur.user_id = $1 AND p.key = $2
            )
            "#,
        )
        .bind(user_id)
        .bind(key)
        .fetch_one(self.pool())
        .await?;

        Ok(exists)
    }
}
