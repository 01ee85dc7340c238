//! Role repository (角色数据访问)

use async_trait::async_trait;

use super::{PgAclStore, RoleStore};
use crate::{
    error::AppError,
    models::{
        permission::Permission,
        role::{NewRole, Role},
    },
};

#[async_trait]
impl RoleStore for PgAclStore {
    // ==================== Roles ====================

    /// 根据 ID 查找角色
    async fn find_role(&self, id: i64) -> Result<Option<Role>, AppError> {
        let role = sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;

        Ok(role)
    }

    /// 根据名称查找角色
    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, AppError> {
        let role = sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE name = $1")
            .bind(name)
            .fetch_optional(self.pool())
            .await?;

        Ok(role)
    }

    /// 列出所有角色
    async fn list_roles(&self) -> Result<Vec<Role>, AppError> {
        let roles = sqlx::query_as::<_, Role>("SELECT * FROM roles ORDER BY name")
            .fetch_all(self.pool())
            .await?;

        Ok(roles)
    }

    /// 创建角色
    async fn insert_role(&self, role: &NewRole) -> Result<Role, AppError> {
        let role = sqlx::query_as::<_, Role>(
            r#"
            INSERT INTO roles (name, description)
            VALUES ($1, $2)
            RETURNING *
            "#,
        )
        .bind(&role.name)
        .bind(&role.description)
        .fetch_one(self.pool())
        .await?;

        Ok(role)
    }

    /// 更新角色
    async fn update_role(&self, role: &Role) -> Result<Option<Role>, AppError> {
        let role = sqlx::query_as::<_, Role>(
            r#"
            UPDATE roles
            SET
                name = $2,
                description = $3,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(role.id)
        .bind(&role.name)
        .bind(&role.description)
        .fetch_optional(self.pool())
        .await?;

        Ok(role)
    }

    /// 删除角色（仍有关联时由外键拒绝）
    async fn delete_role(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // ==================== Permissions ====================

    /// 获取角色的所有权限
    async fn role_permissions(&self, role_id: i64) -> Result<Vec<Permission>, AppError> {
        let permissions = sqlx::query_as::<_, Permission>(
            r#"
            SELECT p.*
            FROM permissions p
            JOIN role_permissions rp ON p.id = rp.permission_id
            WHERE rp.role_id = $1
            ORDER BY p.key
            "#,
        )
        .bind(role_id)
        .fetch_all(self.pool())
        .await?;

        Ok(permissions)
    }

    /// 为角色添加权限
    async fn attach_permission(&self, role_id: i64, permission_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query(
            "INSERT INTO role_permissions (role_id, permission_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(role_id)
        .bind(permission_id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// 从角色移除权限
    async fn detach_permission(&self, role_id: i64, permission_id: i64) -> Result<bool, AppError> {
        let result =
            sqlx::query("DELETE FROM role_permissions WHERE role_id = $1 AND permission_id = $2")
                .bind(role_id)
                .bind(permission_id)
                .execute(self.pool())
                .await?;

        Ok(result.rows_affected() > 0)
    }
}
