//! 用户、角色、权限管理 API 集成测试

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

mod common;
use common::{
    body_json, create_admin_user, create_test_app_state, create_test_role, create_test_user,
    create_user_with_key, session_cookie, ADMIN_ROLE_ID, PASSWORD,
};

/// 登录并返回会话 Cookie
async fn login(app: &Router, username: &str) -> String {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/session/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "username": username, "password": PASSWORD }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    session_cookie(&response).expect("session cookie")
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    cookie: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    (status, body_json(response).await)
}

#[tokio::test]
async fn test_guest_cannot_manage() {
    let app = acl_system::routes::create_router(create_test_app_state());

    for uri in ["/api/v1/users", "/api/v1/roles", "/api/v1/permissions"] {
        let (status, json) = send(&app, "GET", uri, None, None).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{}", uri);
        assert_eq!(json["error"]["code"], 403);
    }
}

#[tokio::test]
async fn test_admin_builds_the_graph() {
    let state = create_test_app_state();
    create_admin_user(&state, "root").await;
    let app = acl_system::routes::create_router(state.clone());
    let cookie = login(&app, "root").await;
    let cookie = Some(cookie.as_str());

    let (status, user) = send(
        &app,
        "POST",
        "/api/v1/users",
        cookie,
        Some(json!({
            "username": "dmyers",
            "email": "don@example.com",
            "password": "Secret123",
            "meta": { "team": "files" }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(user["meta"]["team"], "files");
    let user_id = user["id"].as_i64().unwrap();

    let (status, role) = send(
        &app,
        "POST",
        "/api/v1/roles",
        cookie,
        Some(json!({ "name": "openers", "description": "Can open files" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let role_id = role["id"].as_i64().unwrap();

    let (status, permission) = send(
        &app,
        "POST",
        "/api/v1/permissions",
        cookie,
        Some(json!({ "key": "uri://open/file", "group": "files" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(permission["group"], "files");
    let permission_id = permission["id"].as_i64().unwrap();

    let uri = format!("/api/v1/roles/{}/permissions/{}", role_id, permission_id);
    let (status, json) = send(&app, "PUT", &uri, cookie, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["added"], true);
    let (_, json) = send(&app, "PUT", &uri, cookie, None).await;
    assert_eq!(json["added"], false);

    let uri = format!("/api/v1/users/{}/roles/{}", user_id, role_id);
    let (status, json) = send(&app, "PUT", &uri, cookie, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["added"], true);

    let (status, json) = send(
        &app,
        "GET",
        &format!("/api/v1/users/{}/roles", user_id),
        cookie,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["roles"][0]["name"], "openers");
    assert_eq!(json["permissions"], json!(["uri://open/file"]));

    assert!(state.permissions.can(user_id, "uri://open/file").await.unwrap());

    // 仍有关联的角色不能删除
    let (status, json) = send(
        &app,
        "DELETE",
        &format!("/api/v1/roles/{}", role_id),
        cookie,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"]["code"], 409);
}

#[tokio::test]
async fn test_validation_errors_list_fields() {
    let state = create_test_app_state();
    create_admin_user(&state, "root").await;
    let app = acl_system::routes::create_router(state);
    let cookie = login(&app, "root").await;

    let (status, json) = send(
        &app,
        "POST",
        "/api/v1/users",
        Some(&cookie),
        Some(json!({ "username": "nomail", "password": "Secret123" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], 400);
    let fields = json["error"]["fields"].as_array().unwrap();
    assert!(fields
        .iter()
        .any(|f| f["field"] == "email" && f["rule"] == "required"));
    assert!(fields.iter().all(|f| f["field"] == "email"));
}

#[tokio::test]
async fn test_key_holder_manages_only_its_area() {
    let state = create_test_app_state();
    create_user_with_key(&state, "roleadmin", "uri://acl/roles").await;
    let app = acl_system::routes::create_router(state);
    let cookie = login(&app, "roleadmin").await;

    let (status, _) = send(&app, "GET", "/api/v1/roles", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "GET", "/api/v1/users", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_update_and_delete_user() {
    let state = create_test_app_state();
    create_admin_user(&state, "root").await;
    let target = create_test_user(&state, "target").await;
    let app = acl_system::routes::create_router(state.clone());
    let cookie = login(&app, "root").await;
    let uri = format!("/api/v1/users/{}", target.id);

    let (status, json) = send(
        &app,
        "PUT",
        &uri,
        Some(&cookie),
        Some(json!({ "email": "moved@example.com", "password": "Rotated123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["email"], "moved@example.com");

    let stored = state.acl.get_user(target.id).await.unwrap();
    assert_ne!(stored.password_hash, target.password_hash);

    let (status, _) = send(&app, "DELETE", &uri, Some(&cookie), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "GET", &uri, Some(&cookie), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_users_is_paginated() {
    let state = create_test_app_state();
    create_admin_user(&state, "root").await;
    for name in ["alpha", "bravo", "charlie"] {
        create_test_user(&state, name).await;
    }
    let app = acl_system::routes::create_router(state);
    let cookie = login(&app, "root").await;

    let (status, json) = send(
        &app,
        "GET",
        "/api/v1/users?limit=2&offset=1",
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 2);
    assert_eq!(json["users"][0]["username"], "root");
    assert_eq!(json["users"][1]["username"], "alpha");
}

#[tokio::test]
async fn test_permission_crud() {
    let state = create_test_app_state();
    create_admin_user(&state, "root").await;
    let app = acl_system::routes::create_router(state);
    let cookie = login(&app, "root").await;

    let (_, created) = send(
        &app,
        "POST",
        "/api/v1/permissions",
        Some(&cookie),
        Some(json!({ "key": "uri://close/file" })),
    )
    .await;
    let uri = format!("/api/v1/permissions/{}", created["id"]);

    let (status, json) = send(
        &app,
        "PUT",
        &uri,
        Some(&cookie),
        Some(json!({ "description": "Close a file" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["description"], "Close a file");

    let (status, json) = send(
        &app,
        "PUT",
        &uri,
        Some(&cookie),
        Some(json!({ "key": "no scheme" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["fields"][0]["field"], "key");

    let (status, _) = send(&app, "DELETE", &uri, Some(&cookie), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_rejected_update_leaves_user_unchanged() {
    let state = create_test_app_state();
    create_admin_user(&state, "root").await;
    let target = create_test_user(&state, "target").await;
    let app = acl_system::routes::create_router(state.clone());
    let cookie = login(&app, "root").await;

    let (status, json) = send(
        &app,
        "PUT",
        &format!("/api/v1/users/{}", target.id),
        Some(&cookie),
        Some(json!({ "email": "changed@example.com", "password": "weak" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["fields"][0]["field"], "password");

    let stored = state.acl.get_user(target.id).await.unwrap();
    assert_eq!(stored.email, target.email);
    assert_eq!(stored.password_hash, target.password_hash);
}

#[tokio::test]
async fn test_user_manager_cannot_reach_admin() {
    let state = create_test_app_state();
    let root = create_admin_user(&state, "root").await;
    let manager = create_user_with_key(&state, "manager", "uri://acl/users").await;
    let staff = create_test_role(&state, "staff").await;
    let app = acl_system::routes::create_router(state.clone());
    let cookie = login(&app, "manager").await;
    let cookie = Some(cookie.as_str());

    // 不能授予自己管理员角色
    let uri = format!("/api/v1/users/{}/roles/{}", manager.id, ADMIN_ROLE_ID);
    let (status, _) = send(&app, "PUT", &uri, cookie, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(!state.permissions.is_admin(manager.id).await.unwrap());

    // 不能修改管理员账户
    let uri = format!("/api/v1/users/{}", root.id);
    let (status, _) = send(
        &app,
        "PUT",
        &uri,
        cookie,
        Some(json!({ "password": "Takeover123" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let stored = state.acl.get_user(root.id).await.unwrap();
    assert_eq!(stored.password_hash, root.password_hash);

    let uri = format!("/api/v1/users/{}/roles/{}", root.id, ADMIN_ROLE_ID);
    let (status, _) = send(&app, "DELETE", &uri, cookie, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(state.permissions.is_admin(root.id).await.unwrap());

    // 普通角色仍可管理
    let uri = format!("/api/v1/users/{}/roles/{}", manager.id, staff.id);
    let (status, json) = send(&app, "PUT", &uri, cookie, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["added"], true);
}
