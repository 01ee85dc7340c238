//! 路由注册
//! 创建所有 API 路由并应用中间件

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tower_sessions::{cookie::time::Duration, Expiry, MemoryStore, SessionManagerLayer};

use crate::{config::SessionConfig, handlers, middleware::AppState};

/// 创建应用路由（会话保存在进程内存中）
pub fn create_router(state: Arc<AppState>) -> Router {
    let session_layer = session_layer(MemoryStore::default(), &state.config.session);
    let body_limit = state.config.server.body_limit_bytes;

    let session_routes = Router::new()
        .route(
            "/session",
            get(handlers::session::current)
                .put(handlers::session::change)
                .delete(handlers::session::logout),
        )
        .route("/session/login", post(handlers::session::login))
        .route("/session/can", get(handlers::session::can));

    let user_routes = Router::new()
        .route(
            "/users",
            get(handlers::user::list_users).post(handlers::user::create_user),
        )
        .route(
            "/users/{id}",
            get(handlers::user::get_user)
                .put(handlers::user::update_user)
                .delete(handlers::user::delete_user),
        )
        .route("/users/{id}/roles", get(handlers::user::list_user_roles))
        .route(
            "/users/{id}/roles/{role_id}",
            put(handlers::user::add_role).delete(handlers::user::remove_role),
        );

    let role_routes = Router::new()
        .route(
            "/roles",
            get(handlers::role::list_roles).post(handlers::role::create_role),
        )
        .route(
            "/roles/{id}",
            get(handlers::role::get_role)
                .put(handlers::role::update_role)
                .delete(handlers::role::delete_role),
        )
        .route(
            "/roles/{id}/permissions",
            get(handlers::role::list_role_permissions),
        )
        .route(
            "/roles/{id}/permissions/{permission_id}",
            put(handlers::role::add_permission).delete(handlers::role::remove_permission),
        );

    let permission_routes = Router::new()
        .route(
            "/permissions",
            get(handlers::permission::list_permissions)
                .post(handlers::permission::create_permission),
        )
        .route(
            "/permissions/{id}",
            get(handlers::permission::get_permission)
                .put(handlers::permission::update_permission)
                .delete(handlers::permission::delete_permission),
        );

    // 公开端点（健康检查）
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check));

    let api = Router::new()
        .merge(public_routes)
        .merge(session_routes)
        .merge(user_routes)
        .merge(role_routes)
        .merge(permission_routes);

    Router::new()
        .nest("/api/v1", api)
        .layer(session_layer)
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(
            crate::middleware::request_tracking_middleware,
        ))
        .with_state(state)
}

/// 会话 Cookie 配置
fn session_layer(store: MemoryStore, config: &SessionConfig) -> SessionManagerLayer<MemoryStore> {
    SessionManagerLayer::new(store)
        .with_name(config.cookie_name.clone())
        .with_secure(config.secure)
        .with_expiry(Expiry::OnInactivity(Duration::seconds(config.inactivity_secs)))
}
