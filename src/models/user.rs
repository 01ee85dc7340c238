//! User domain models

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use validator::Validate;

use crate::validation::{require, EntityKey, FieldError, Operation, RuleSet};

pub const USER_RULE_SET: &str = "user";

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.-]+$").expect("valid username pattern"));

/// User account
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, Validate)]
pub struct User {
    #[validate(range(min = 1, message = "id must be a positive integer"))]
    pub id: i64,
    #[validate(length(min = 3, max = 64, message = "username must be 3 to 64 characters"))]
    pub username: String,
    #[validate(
        email(message = "email is not a valid address"),
        length(max = 255, message = "email must be at most 255 characters")
    )]
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub is_active: bool,
    pub meta: Json<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RuleSet for User {
    fn rule_set(&self) -> &'static str {
        USER_RULE_SET
    }

    fn check(&self, op: Operation) -> Vec<FieldError> {
        match op {
            Operation::Delete | Operation::Read => EntityKey::new(USER_RULE_SET, self.id).check(op),
            Operation::Create | Operation::Update => {
                let mut errors = FieldError::collect(self.validate());
                profile_rules(&mut errors, &self.username, &self.email, &self.meta.0);
                errors
            }
        }
    }
}

/// New user draft, validated before insert
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct NewUser {
    #[validate(length(min = 3, max = 64, message = "username must be 3 to 64 characters"))]
    pub username: String,
    #[validate(
        email(message = "email is not a valid address"),
        length(max = 255, message = "email must be at most 255 characters")
    )]
    pub email: String,
    #[validate(length(min = 8, max = 128, message = "password must be 8 to 128 characters"))]
    pub password: String,
    pub is_active: bool,
    pub meta: Value,
}

impl Default for NewUser {
    fn default() -> Self {
        Self {
            username: String::new(),
            email: String::new(),
            password: String::new(),
            is_active: true,
            meta: Value::Object(Default::default()),
        }
    }
}

impl NewUser {
    pub fn new(username: &str, email: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            ..Default::default()
        }
    }
}

impl RuleSet for NewUser {
    fn rule_set(&self) -> &'static str {
        USER_RULE_SET
    }

    fn check(&self, _op: Operation) -> Vec<FieldError> {
        let mut errors = FieldError::collect(self.validate());
        require(&mut errors, "password", &self.password);
        profile_rules(&mut errors, &self.username, &self.email, &self.meta);
        errors
    }
}

/// Password replacement, validated under the user rule set
#[derive(Debug, Clone, Validate)]
pub struct PasswordChange {
    #[validate(range(min = 1, message = "id must be a positive integer"))]
    pub id: i64,
    #[validate(length(min = 8, max = 128, message = "password must be 8 to 128 characters"))]
    pub password: String,
}

impl RuleSet for PasswordChange {
    fn rule_set(&self) -> &'static str {
        USER_RULE_SET
    }

    fn check(&self, _op: Operation) -> Vec<FieldError> {
        let mut errors = FieldError::collect(self.validate());
        require(&mut errors, "password", &self.password);
        errors
    }
}

/// Row handed to the store once the draft passed the gate
#[derive(Debug, Clone)]
pub struct UserRow {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_active: bool,
    pub meta: Value,
}

fn profile_rules(errors: &mut Vec<FieldError>, username: &str, email: &str, meta: &Value) {
    require(errors, "username", username);
    require(errors, "email", email);

    if !username.is_empty() && !USERNAME_RE.is_match(username) {
        errors.push(FieldError::new(
            "username",
            "format",
            "username may only contain letters, digits, '_', '.' and '-'",
        ));
    }

    if !meta.is_object() {
        errors.push(FieldError::new("meta", "object", "meta must be a JSON object"));
    }
}

/// Update user request; absent fields keep their current value
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub is_active: Option<bool>,
    pub meta: Option<Value>,
}

impl UpdateUserRequest {
    /// Assign the provided fields onto a loaded user
    pub fn apply(&self, user: &mut User) {
        if let Some(username) = &self.username {
            user.username = username.clone();
        }
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
        if let Some(is_active) = self.is_active {
            user.is_active = is_active;
        }
        if let Some(meta) = &self.meta {
            user.meta = Json(meta.clone());
        }
    }
}

/// Login request
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Switch the session identity
#[derive(Debug, Deserialize)]
pub struct ChangeIdentityRequest {
    pub user_id: i64,
}

/// Pagination query
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

impl ListQuery {
    pub fn clamped(&self) -> (i64, i64) {
        (self.limit.clamp(1, 500), self.offset.max(0))
    }
}
