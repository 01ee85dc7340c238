//! 权限管理的 HTTP 处理器

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
    models::permission::{NewPermission, UpdatePermissionRequest},
    services::permission_service::MANAGE_PERMISSIONS,
};

pub async fn list_permissions(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    state
        .permissions
        .require(&current.principal, MANAGE_PERMISSIONS)?;

    let permissions = state.acl.list_permissions().await?;

    Ok(Json(json!({
        "permissions": permissions,
        "count": permissions.len()
    })))
}

pub async fn create_permission(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Json(req): Json<NewPermission>,
) -> Result<impl IntoResponse, AppError> {
    state
        .permissions
        .require(&current.principal, MANAGE_PERMISSIONS)?;

    let permission = state.acl.create_permission(req).await?;

    Ok((StatusCode::CREATED, Json(permission)))
}

pub async fn get_permission(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    state
        .permissions
        .require(&current.principal, MANAGE_PERMISSIONS)?;

    Ok(Json(state.acl.get_permission(id).await?))
}

pub async fn update_permission(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdatePermissionRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .permissions
        .require(&current.principal, MANAGE_PERMISSIONS)?;

    let mut permission = state.acl.get_permission(id).await?;
    req.apply(&mut permission);

    Ok(Json(state.acl.update_permission(&permission).await?))
}

pub async fn delete_permission(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    state
        .permissions
        .require(&current.principal, MANAGE_PERMISSIONS)?;

    state.acl.delete_permission(id).await?;

    Ok(StatusCode::NO_CONTENT)
}
