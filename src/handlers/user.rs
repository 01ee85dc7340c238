//! 用户管理的 HTTP 处理器

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::{
    error::AppError,
    middleware::{AppState, CurrentUser},
    models::user::{ListQuery, NewUser, UpdateUserRequest},
    services::permission_service::MANAGE_USERS,
};

/// 列出用户
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    state.permissions.require(&current.principal, MANAGE_USERS)?;

    let (limit, offset) = query.clamped();
    let users = state.acl.list_users(limit, offset).await?;

    Ok(Json(json!({
        "users": users,
        "count": users.len(),
        "limit": limit,
        "offset": offset,
    })))
}

/// 创建用户
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Json(req): Json<NewUser>,
) -> Result<impl IntoResponse, AppError> {
    state.permissions.require(&current.principal, MANAGE_USERS)?;

    let user = state.acl.create_user(req).await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// 获取用户详情
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    state.permissions.require(&current.principal, MANAGE_USERS)?;

    let user = state.acl.get_user(id).await?;

    Ok(Json(user))
}

/// 更新用户；提供 password 时同时修改密码，全部规则通过后才写入
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.permissions.require(&current.principal, MANAGE_USERS)?;
    state
        .permissions
        .require_admin_for(&current.principal, id, None)
        .await?;

    let mut user = state.acl.get_user(id).await?;
    req.apply(&mut user);
    let user = state
        .acl
        .update_user_with_password(&user, req.password.as_deref())
        .await?;

    Ok(Json(user))
}

/// 删除用户
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    state.permissions.require(&current.principal, MANAGE_USERS)?;
    state
        .permissions
        .require_admin_for(&current.principal, id, None)
        .await?;

    state.acl.delete_user(id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// 用户的角色
pub async fn list_user_roles(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    state.permissions.require(&current.principal, MANAGE_USERS)?;

    let roles = state.acl.user_roles(id).await?;
    let permissions = state.permissions.user_permissions(id).await?;

    Ok(Json(json!({
        "user_id": id,
        "roles": roles,
        "permissions": permissions,
    })))
}

/// 为用户分配角色
pub async fn add_role(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path((id, role_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    state.permissions.require(&current.principal, MANAGE_USERS)?;
    state
        .permissions
        .require_admin_for(&current.principal, id, Some(role_id))
        .await?;

    let added = state.acl.add_role(id, role_id).await?;

    Ok(Json(json!({ "user_id": id, "role_id": role_id, "added": added })))
}

/// 撤销用户的角色
pub async fn remove_role(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path((id, role_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    state.permissions.require(&current.principal, MANAGE_USERS)?;
    state
        .permissions
        .require_admin_for(&current.principal, id, Some(role_id))
        .await?;

    let removed = state.acl.remove_role(id, role_id).await?;

    Ok(Json(json!({ "user_id": id, "role_id": role_id, "removed": removed })))
}
