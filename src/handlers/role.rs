//! 角色管理的 HTTP 处理器

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::{
    error::AppError,
    middleware::{AppState, CurrentUser},
    models::role::{NewRole, UpdateRoleRequest},
    services::permission_service::MANAGE_ROLES,
};

/// 列出角色
pub async fn list_roles(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    state.permissions.require(&current.principal, MANAGE_ROLES)?;

    let roles = state.acl.list_roles().await?;

    Ok(Json(json!({
        "roles": roles,
        "count": roles.len()
    })))
}

/// 创建角色
pub async fn create_role(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Json(req): Json<NewRole>,
) -> Result<impl IntoResponse, AppError> {
    state.permissions.require(&current.principal, MANAGE_ROLES)?;

    let role = state.acl.create_role(req).await?;

    Ok((StatusCode::CREATED, Json(role)))
}

pub async fn get_role(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    state.permissions.require(&current.principal, MANAGE_ROLES)?;

    Ok(Json(state.acl.get_role(id).await?))
}

pub async fn update_role(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateRoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.permissions.require(&current.principal, MANAGE_ROLES)?;

    let mut role = state.acl.get_role(id).await?;
    req.apply(&mut role);

    Ok(Json(state.acl.update_role(&role).await?))
}

pub async fn delete_role(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    state.permissions.require(&current.principal, MANAGE_ROLES)?;

    state.acl.delete_role(id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// 角色持有的权限
pub async fn list_role_permissions(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    state.permissions.require(&current.principal, MANAGE_ROLES)?;

    let permissions = state.acl.role_permissions(id).await?;

    Ok(Json(json!({
        "role_id": id,
        "permissions": permissions,
    })))
}

/// 为角色添加权限
pub async fn add_permission(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path((id, permission_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    state.permissions.require(&current.principal, MANAGE_ROLES)?;

    let added = state.acl.add_permission(id, permission_id).await?;

    Ok(Json(json!({ "role_id": id, "permission_id": permission_id, "added": added })))
}

/// 从角色移除权限
pub async fn remove_permission(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path((id, permission_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    state.permissions.require(&current.principal, MANAGE_ROLES)?;

    let removed = state.acl.remove_permission(id, permission_id).await?;

    Ok(Json(json!({ "role_id": id, "permission_id": permission_id, "removed": removed })))
}
