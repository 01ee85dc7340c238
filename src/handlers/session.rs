//! 会话身份的 HTTP 处理器

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::{
    error::AppError,
    middleware::{AppState, CurrentUser},
    models::{
        permission::CanQuery,
        principal::PrincipalResponse,
        user::{ChangeIdentityRequest, LoginRequest},
    },
};

/// 当前会话身份
pub async fn current(current: CurrentUser) -> Json<PrincipalResponse> {
    Json(current.principal.into())
}

/// 切换会话身份（仅管理员）
pub async fn change(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Json(req): Json<ChangeIdentityRequest>,
) -> Result<Json<PrincipalResponse>, AppError> {
    state.permissions.require_admin(&current.principal)?;

    let principal = state.identity.change(&current.session, req.user_id).await?;

    tracing::info!(
        actor_id = current.principal.id(),
        user_id = principal.id(),
        "Administrator switched session identity"
    );

    Ok(Json(principal.into()))
}

/// 登出，回到访客身份
pub async fn logout(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
) -> Result<Json<PrincipalResponse>, AppError> {
    let principal = state.identity.logout(&current.session).await?;
    Ok(Json(principal.into()))
}

/// 用户名密码登录
pub async fn login(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Json(req): Json<LoginRequest>,
) -> Result<Json<PrincipalResponse>, AppError> {
    let principal = state
        .identity
        .login(&current.session, &req.username, &req.password)
        .await?;
    Ok(Json(principal.into()))
}

/// 当前身份是否拥有某个权限键
pub async fn can(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Query(query): Query<CanQuery>,
) -> Result<impl IntoResponse, AppError> {
    let allowed = state
        .permissions
        .can(current.principal.id(), &query.key)
        .await?;

    Ok(Json(json!({
        "user_id": current.principal.id(),
        "key": query.key,
        "allowed": allowed,
        "is_admin": current.principal.is_admin(),
    })))
}
