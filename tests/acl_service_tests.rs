//! ACL 服务集成测试
//! 覆盖实体校验、关联维护和权限判定

use acl_system::{
    error::AppError,
    models::{
        permission::NewPermission,
        role::NewRole,
        user::NewUser,
    },
    repository::UserStore,
    validation::Operation,
};
use serde_json::json;

mod common;
use common::{
    create_admin_user, create_test_app_state, create_test_permission, create_test_role,
    create_test_user, ADMIN_ROLE_ID, GUEST_ID,
};

// ==================== 权限判定 ====================

#[tokio::test]
async fn test_dmyers_scenario() {
    let state = create_test_app_state();

    let dmyers = state
        .acl
        .create_user(NewUser::new("dmyers", "don@example.com", "Secret123"))
        .await
        .unwrap();
    let admin = state.acl.get_role(ADMIN_ROLE_ID).await.unwrap();
    let open = create_test_permission(&state, "uri://open/file").await;

    state.acl.add_permission(admin.id, open.id).await.unwrap();
    state.acl.add_role(dmyers.id, admin.id).await.unwrap();

    assert!(state.permissions.can(dmyers.id, "uri://open/file").await.unwrap());
    assert!(!state.permissions.can(dmyers.id, "uri://close/file").await.unwrap());
    assert!(state.permissions.is_admin(dmyers.id).await.unwrap());
}

#[tokio::test]
async fn test_user_without_roles_cannot_anything() {
    let state = create_test_app_state();
    let user = create_test_user(&state, "norole").await;
    create_test_permission(&state, "uri://open/file").await;

    assert!(!state.permissions.can(user.id, "uri://open/file").await.unwrap());
    assert!(!state.permissions.can(user.id, "").await.unwrap());
    assert!(state.permissions.user_permissions(user.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_user_is_denied_not_error() {
    let state = create_test_app_state();
    assert!(!state.permissions.can(9999, "uri://open/file").await.unwrap());
    assert!(!state.permissions.is_admin(9999).await.unwrap());
}

#[tokio::test]
async fn test_key_match_is_exact() {
    let state = create_test_app_state();
    let user = create_test_user(&state, "exact").await;
    let role = create_test_role(&state, "readers").await;
    let perm = create_test_permission(&state, "uri://open/file").await;
    state.acl.add_permission(role.id, perm.id).await.unwrap();
    state.acl.add_role(user.id, role.id).await.unwrap();

    assert!(state.permissions.can(user.id, "uri://open/file").await.unwrap());
    assert!(!state.permissions.can(user.id, "uri://OPEN/file").await.unwrap());
    assert!(!state.permissions.can(user.id, "uri://open").await.unwrap());
    assert!(!state.permissions.can(user.id, "uri://open/file/child").await.unwrap());
}

#[tokio::test]
async fn test_is_admin_independent_of_grants() {
    let state = create_test_app_state();

    // 管理员角色没有任何权限
    let admin = create_admin_user(&state, "root").await;
    assert!(state.permissions.is_admin(admin.id).await.unwrap());
    assert!(!state.permissions.can(admin.id, "uri://open/file").await.unwrap());

    // 普通角色拥有权限但不是管理员
    let user = create_test_user(&state, "worker").await;
    let role = create_test_role(&state, "workers").await;
    let perm = create_test_permission(&state, "uri://open/file").await;
    state.acl.add_permission(role.id, perm.id).await.unwrap();
    state.acl.add_role(user.id, role.id).await.unwrap();
    assert!(!state.permissions.is_admin(user.id).await.unwrap());
}

#[tokio::test]
async fn test_require_lets_admin_through() {
    let state = create_test_app_state();
    let admin = create_admin_user(&state, "root").await;
    let user = create_test_user(&state, "plain").await;

    let admin_principal = state.permissions.principal(admin.id).await.unwrap().unwrap();
    let user_principal = state.permissions.principal(user.id).await.unwrap().unwrap();

    state
        .permissions
        .require(&admin_principal, "uri://anything")
        .unwrap();
    assert!(matches!(
        state.permissions.require(&user_principal, "uri://anything"),
        Err(AppError::Forbidden)
    ));
    assert!(matches!(
        state.permissions.require_admin(&user_principal),
        Err(AppError::Forbidden)
    ));
}

// ==================== 关联维护 ====================

#[tokio::test]
async fn test_add_permission_is_idempotent() {
    let state = create_test_app_state();
    let role = create_test_role(&state, "editors").await;
    let perm = create_test_permission(&state, "uri://open/file").await;

    assert!(state.acl.add_permission(role.id, perm.id).await.unwrap());
    assert!(!state.acl.add_permission(role.id, perm.id).await.unwrap());

    let permissions = state.acl.role_permissions(role.id).await.unwrap();
    assert_eq!(permissions.len(), 1);
    assert_eq!(permissions[0].key, "uri://open/file");
}

#[tokio::test]
async fn test_add_permission_requires_both_ends() {
    let state = create_test_app_state();
    let role = create_test_role(&state, "editors").await;

    assert!(matches!(
        state.acl.add_permission(role.id, 42).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        state.acl.add_role(42, role.id).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_add_permission_with_invalid_id_is_validation_error() {
    let state = create_test_app_state();
    let err = state.acl.add_permission(0, 1).await.unwrap_err();

    let failure = err.validation_failure().expect("validation failure");
    assert_eq!(failure.rule_set, "role");
    assert!(failure.has_field("id"));
}

#[tokio::test]
async fn test_remove_role_and_permission() {
    let state = create_test_app_state();
    let user = create_test_user(&state, "temp").await;
    let role = create_test_role(&state, "temps").await;
    let perm = create_test_permission(&state, "uri://open/file").await;
    state.acl.add_permission(role.id, perm.id).await.unwrap();
    state.acl.add_role(user.id, role.id).await.unwrap();

    assert!(state.acl.remove_permission(role.id, perm.id).await.unwrap());
    assert!(!state.acl.remove_permission(role.id, perm.id).await.unwrap());
    assert!(!state.permissions.can(user.id, "uri://open/file").await.unwrap());

    assert!(state.acl.remove_role(user.id, role.id).await.unwrap());
    assert!(state.acl.user_roles(user.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_associated_role_conflicts() {
    let state = create_test_app_state();
    let user = create_test_user(&state, "member").await;
    let role = create_test_role(&state, "members").await;
    state.acl.add_role(user.id, role.id).await.unwrap();

    assert!(matches!(
        state.acl.delete_role(role.id).await,
        Err(AppError::Conflict(_))
    ));
    // 状态保持不变
    assert_eq!(state.acl.user_roles(user.id).await.unwrap().len(), 1);

    state.acl.remove_role(user.id, role.id).await.unwrap();
    state.acl.delete_role(role.id).await.unwrap();
    assert!(matches!(
        state.acl.get_role(role.id).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_guest_and_admin_role_cannot_be_deleted() {
    let state = create_test_app_state();
    assert!(matches!(
        state.acl.delete_user(GUEST_ID).await,
        Err(AppError::Conflict(_))
    ));
    assert!(matches!(
        state.acl.delete_role(ADMIN_ROLE_ID).await,
        Err(AppError::Conflict(_))
    ));
}

// ==================== 校验门 ====================

#[tokio::test]
async fn test_create_user_missing_email_writes_nothing() {
    let state = create_test_app_state();
    let before = state.store.list_users(100, 0).await.unwrap().len();

    let err = state
        .acl
        .create_user(NewUser::new("nomail", "", "Secret123"))
        .await
        .unwrap_err();

    let failure = err.validation_failure().expect("validation failure");
    assert_eq!(failure.rule_set, "user");
    assert_eq!(failure.operation, Operation::Create);
    assert!(failure.has_rule("email", "required"));

    assert_eq!(state.store.list_users(100, 0).await.unwrap().len(), before);
    assert!(state.store.find_user_by_username("nomail").await.unwrap().is_none());
}

#[tokio::test]
async fn test_create_user_reports_every_failing_field() {
    let state = create_test_app_state();
    let mut draft = NewUser::new("x", "bad", "short");
    draft.meta = json!("not an object");

    let err = state.acl.create_user(draft).await.unwrap_err();
    let failure = err.validation_failure().unwrap();

    assert_eq!(failure.fields(), vec!["email", "meta", "password", "username"]);
}

#[tokio::test]
async fn test_create_user_enforces_password_policy() {
    let state = create_test_app_state();
    let err = state
        .acl
        .create_user(NewUser::new("weakling", "weak@example.com", "alllowercase"))
        .await
        .unwrap_err();

    let failure = err.validation_failure().unwrap();
    assert!(failure.has_rule("password", "uppercase"));
    assert!(failure.has_rule("password", "digit"));
}

#[tokio::test]
async fn test_duplicate_username_is_validation_error() {
    let state = create_test_app_state();
    create_test_user(&state, "dmyers").await;

    let err = state
        .acl
        .create_user(NewUser::new("dmyers", "other@example.com", "Secret123"))
        .await
        .unwrap_err();

    assert!(err.validation_failure().unwrap().has_rule("username", "unique"));
}

#[tokio::test]
async fn test_create_user_hashes_password() {
    let state = create_test_app_state();
    let user = create_test_user(&state, "hashed").await;

    assert!(user.password_hash.starts_with("$argon2id$"));
    assert!(user.is_active);
    assert_eq!(user.meta.0, json!({}));
}

#[tokio::test]
async fn test_update_user_runs_rule_set() {
    let state = create_test_app_state();
    let mut user = create_test_user(&state, "updatable").await;

    user.email = "updated@example.com".to_string();
    user.meta = sqlx::types::Json(json!({"team": "ops"}));
    let updated = state.acl.update_user(&user).await.unwrap();
    assert_eq!(updated.email, "updated@example.com");
    assert_eq!(updated.meta.0["team"], "ops");

    user.email = "broken".to_string();
    let err = state.acl.update_user(&user).await.unwrap_err();
    assert_eq!(err.validation_failure().unwrap().operation, Operation::Update);

    let stored = state.acl.get_user(user.id).await.unwrap();
    assert_eq!(stored.email, "updated@example.com");
}

#[tokio::test]
async fn test_update_user_rejects_taken_username() {
    let state = create_test_app_state();
    create_test_user(&state, "first").await;
    let mut second = create_test_user(&state, "second").await;

    second.username = "first".to_string();
    let err = state.acl.update_user(&second).await.unwrap_err();
    assert!(err.validation_failure().unwrap().has_rule("username", "unique"));

    // 保持自身用户名不算冲突
    second.username = "second".to_string();
    state.acl.update_user(&second).await.unwrap();
}

#[tokio::test]
async fn test_set_password() {
    let state = create_test_app_state();
    let user = create_test_user(&state, "rotating").await;

    state.acl.set_password(user.id, "NewSecret99").await.unwrap();
    let stored = state.acl.get_user(user.id).await.unwrap();
    assert_ne!(stored.password_hash, user.password_hash);

    let err = state.acl.set_password(user.id, "").await.unwrap_err();
    assert!(err.validation_failure().unwrap().has_rule("password", "required"));

    assert!(matches!(
        state.acl.set_password(9999, "NewSecret99").await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_update_with_weak_password_writes_nothing() {
    let state = create_test_app_state();
    let mut user = create_test_user(&state, "careful").await;
    let original_email = user.email.clone();

    user.email = "changed@example.com".to_string();
    let err = state
        .acl
        .update_user_with_password(&user, Some("weak"))
        .await
        .unwrap_err();
    let failure = err.validation_failure().unwrap();
    assert_eq!(failure.fields(), vec!["password"]);
    assert!(failure.has_rule("password", "length"));

    let stored = state.acl.get_user(user.id).await.unwrap();
    assert_eq!(stored.email, original_email);
    assert_eq!(stored.password_hash, user.password_hash);

    let updated = state
        .acl
        .update_user_with_password(&user, Some("Rotated123"))
        .await
        .unwrap();
    assert_eq!(updated.email, "changed@example.com");
    let stored = state.acl.get_user(user.id).await.unwrap();
    assert_ne!(stored.password_hash, user.password_hash);
}

#[tokio::test]
async fn test_guest_cannot_be_deactivated() {
    let state = create_test_app_state();
    let mut guest = state.acl.get_user(GUEST_ID).await.unwrap();

    guest.is_active = false;
    let err = state.acl.update_user(&guest).await.unwrap_err();
    assert!(err.validation_failure().unwrap().has_rule("is_active", "guest"));
    assert!(state.acl.get_user(GUEST_ID).await.unwrap().is_active);

    // 其他字段仍可修改
    guest.is_active = true;
    guest.email = "nobody@example.com".to_string();
    state.acl.update_user(&guest).await.unwrap();
}

#[tokio::test]
async fn test_email_longer_than_column_is_field_error() {
    let state = create_test_app_state();
    let email = format!("{}@example.com", "a".repeat(250));

    let err = state
        .acl
        .create_user(NewUser::new("longmail", &email, "Secret123"))
        .await
        .unwrap_err();
    assert!(err.validation_failure().unwrap().has_rule("email", "length"));

    let mut user = create_test_user(&state, "shortmail").await;
    user.email = email;
    let err = state.acl.update_user(&user).await.unwrap_err();
    assert!(err.validation_failure().unwrap().has_rule("email", "length"));
}

#[tokio::test]
async fn test_get_with_invalid_id_is_validation_error() {
    let state = create_test_app_state();
    let err = state.acl.get_user(0).await.unwrap_err();
    let failure = err.validation_failure().unwrap();
    assert_eq!(failure.operation, Operation::Read);
    assert!(failure.has_rule("id", "range"));

    assert!(matches!(
        state.acl.delete_user(-1).await,
        Err(AppError::Validation(_))
    ));
}

#[tokio::test]
async fn test_role_and_permission_rule_sets() {
    let state = create_test_app_state();

    let err = state.acl.create_role(NewRole::new("", None)).await.unwrap_err();
    let failure = err.validation_failure().unwrap();
    assert_eq!(failure.rule_set, "role");
    assert!(failure.has_field("name"));

    create_test_role(&state, "editors").await;
    let err = state
        .acl
        .create_role(NewRole::new("editors", None))
        .await
        .unwrap_err();
    assert!(err.validation_failure().unwrap().has_rule("name", "unique"));

    let err = state
        .acl
        .create_permission(NewPermission::new("open file", None, None))
        .await
        .unwrap_err();
    let failure = err.validation_failure().unwrap();
    assert_eq!(failure.rule_set, "permission");
    assert!(failure.has_rule("key", "format"));
}

#[tokio::test]
async fn test_update_and_delete_permission() {
    let state = create_test_app_state();
    let mut perm = create_test_permission(&state, "uri://open/file").await;

    perm.description = Some("Open a file".to_string());
    perm.group = Some("files".to_string());
    let updated = state.acl.update_permission(&perm).await.unwrap();
    assert_eq!(updated.description.as_deref(), Some("Open a file"));
    assert_eq!(updated.group.as_deref(), Some("files"));

    state.acl.delete_permission(perm.id).await.unwrap();
    assert!(state
        .acl
        .find_permission_by_key("uri://open/file")
        .await
        .unwrap()
        .is_none());
}

// ==================== 初始管理员 ====================

#[tokio::test]
async fn test_ensure_admin_is_idempotent() {
    use acl_system::config::BootstrapAdmin;
    use secrecy::Secret;

    let state = create_test_app_state();
    let admin = BootstrapAdmin {
        username: "admin".to_string(),
        email: "admin@example.com".to_string(),
        password: Secret::new("ChangeMe123".to_string()),
    };

    let first = state.acl.ensure_admin(&admin).await.unwrap();
    let second = state.acl.ensure_admin(&admin).await.unwrap();

    assert_eq!(first.id, second.id);
    assert!(state.permissions.is_admin(first.id).await.unwrap());
    assert_eq!(state.acl.user_roles(first.id).await.unwrap().len(), 1);
}
