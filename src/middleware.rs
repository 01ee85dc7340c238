//! HTTP 中间件
//! 应用状态、请求追踪、当前用户提取

use axum::{
    extract::{FromRequestParts, Request},
    http::{request::Parts, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;
use tower_sessions::Session;
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    error::AppError,
    models::principal::Principal,
    repository::AclStore,
    services::{AclService, IdentityResolver, PermissionService},
};

/// 应用状态，所有服务在启动时创建一次
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn AclStore>,
    pub acl: Arc<AclService>,
    pub permissions: Arc<PermissionService>,
    pub identity: Arc<IdentityResolver>,
}

impl AppState {
    /// 基于给定存储装配全部服务
    pub fn build(config: AppConfig, store: Arc<dyn AclStore>) -> Result<Self, AppError> {
        let hasher = crate::auth::PasswordHasher::from_config(&config.security)?;
        let permissions = Arc::new(PermissionService::new(store.clone(), &config.acl));
        let acl = Arc::new(AclService::new(
            store.clone(),
            hasher.clone(),
            config.security.clone(),
            &config.acl,
        ));
        let identity = Arc::new(IdentityResolver::new(
            store.clone(),
            permissions.clone(),
            hasher,
            &config,
        ));

        Ok(Self {
            config,
            store,
            acl,
            permissions,
            identity,
        })
    }
}

/// 请求追踪中间件
/// 为每个请求生成 trace_id 和 request_id，并记录指标
pub async fn request_tracking_middleware(req: Request, next: Next) -> Response {
    let trace_id = extract_or_generate_trace_id(req.headers());
    let request_id = Uuid::new_v4().to_string();

    let method = req.method().to_string();
    let uri = req.uri().to_string();

    let span = tracing::info_span!(
        "http_request",
        trace_id = %trace_id,
        request_id = %request_id,
        method = %method,
        uri = %uri,
    );

    async move {
        let start = Instant::now();

        let mut response = next.run(req).await;

        let elapsed = start.elapsed();
        let status = response.status().as_u16();

        metrics::counter!(
            "http_requests_total",
            "method" => method_label(&method),
            "status" => status_label(status)
        )
        .increment(1);
        metrics::histogram!("http_request_duration_seconds").record(elapsed.as_secs_f64());

        tracing::info!(
            method = %method,
            uri = %uri,
            status = status,
            elapsed_ms = elapsed.as_millis(),
            "Request completed"
        );

        if let Ok(value) = HeaderValue::from_str(&trace_id) {
            response.headers_mut().insert("x-trace-id", value);
        }
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert("x-request-id", value);
        }

        response
    }
    .instrument(span)
    .await
}

fn method_label(method: &str) -> &'static str {
    match method {
        "GET" => "GET",
        "POST" => "POST",
        "PUT" => "PUT",
        "DELETE" => "DELETE",
        "PATCH" => "PATCH",
        _ => "UNKNOWN",
    }
}

fn status_label(status: u16) -> &'static str {
    match status {
        200 => "200",
        201 => "201",
        204 => "204",
        400 => "400",
        401 => "401",
        403 => "403",
        404 => "404",
        409 => "409",
        500 => "500",
        _ => "other",
    }
}

/// 从请求头中提取或生成 trace_id
fn extract_or_generate_trace_id(headers: &HeaderMap) -> String {
    headers
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// 当前请求的身份：会话与解析出的用户快照
pub struct CurrentUser {
    pub principal: Principal,
    pub session: Session,
}

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|(_, msg)| AppError::Session(msg.to_string()))?;

        let principal = state.identity.load(&session).await?;

        Ok(Self { principal, session })
    }
}
