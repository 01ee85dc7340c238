//! Permission repository (权限数据访问)

use async_trait::async_trait;

use super::{PermissionStore, PgAclStore};
use crate::{
    error::AppError,
    models::permission::{NewPermission, Permission},
};

#[async_trait]
impl PermissionStore for PgAclStore {
    async fn find_permission(&self, id: i64) -> Result<Option<Permission>, AppError> {
        let permission = sqlx::query_as::<_, Permission>("SELECT * FROM permissions WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;

        Ok(permission)
    }

    async fn find_permission_by_key(&self, key: &str) -> Result<Option<Permission>, AppError> {
        let permission =
            sqlx::query_as::<_, Permission>("SELECT * FROM permissions WHERE key = $1")
                .bind(key)
                .fetch_optional(self.pool())
                .await?;

        Ok(permission)
    }

    /// 列出所有权限
    async fn list_permissions(&self) -> Result<Vec<Permission>, AppError> {
        let permissions =
            sqlx::query_as::<_, Permission>("SELECT * FROM permissions ORDER BY key")
                .fetch_all(self.pool())
                .await?;

        Ok(permissions)
    }

    async fn insert_permission(
        &self,
        permission: &NewPermission,
    ) -> Result<Permission, AppError> {
        let permission = sqlx::query_as::<_, Permission>(
            r#"
            INSERT INTO permissions (key, description, permission_group)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(&permission.key)
        .bind(&permission.description)
        .bind(&permission.group)
        .fetch_one(self.pool())
        .await?;

        Ok(permission)
    }

    async fn update_permission(
        &self,
        permission: &Permission,
    ) -> Result<Option<Permission>, AppError> {
        let permission = sqlx::query_as::<_, Permission>(
            r#"
            UPDATE permissions
            SET
                key = $2,
                description = $3,
                permission_group = $4,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(permission.id)
        .bind(&permission.key)
        .bind(&permission.description)
        .bind(&permission.group)
        .fetch_optional(self.pool())
        .await?;

        Ok(permission)
    }

    async fn delete_permission(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM permissions WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
