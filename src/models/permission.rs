//! Permission domain models
//!
//! A permission is an atomic capability named by a URI-like key such as
//! `uri://open/file`. Keys are compared byte for byte.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::validation::{require, EntityKey, FieldError, Operation, RuleSet};

pub const PERMISSION_RULE_SET: &str = "permission";

static PERMISSION_KEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*://\S+$").expect("valid permission key pattern")
});

/// Permission
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, Validate)]
pub struct Permission {
    #[validate(range(min = 1, message = "id must be a positive integer"))]
    pub id: i64,
    #[validate(length(min = 1, max = 255, message = "key must be 1 to 255 characters"))]
    pub key: String,
    #[validate(length(max = 255, message = "description must be at most 255 characters"))]
    pub description: Option<String>,
    #[sqlx(rename = "permission_group")]
    #[validate(length(max = 64, message = "group must be at most 64 characters"))]
    pub group: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RuleSet for Permission {
    fn rule_set(&self) -> &'static str {
        PERMISSION_RULE_SET
    }

    fn check(&self, op: Operation) -> Vec<FieldError> {
        match op {
            Operation::Delete | Operation::Read => {
                EntityKey::new(PERMISSION_RULE_SET, self.id).check(op)
            }
            Operation::Create | Operation::Update => {
                let mut errors = FieldError::collect(self.validate());
                key_rules(&mut errors, &self.key);
                errors
            }
        }
    }
}

/// New permission draft
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct NewPermission {
    #[validate(length(min = 1, max = 255, message = "key must be 1 to 255 characters"))]
    pub key: String,
    #[validate(length(max = 255, message = "description must be at most 255 characters"))]
    pub description: Option<String>,
    #[validate(length(max = 64, message = "group must be at most 64 characters"))]
    pub group: Option<String>,
}

impl NewPermission {
    pub fn new(key: &str, description: Option<&str>, group: Option<&str>) -> Self {
        Self {
            key: key.to_string(),
            description: description.map(str::to_string),
            group: group.map(str::to_string),
        }
    }
}

impl RuleSet for NewPermission {
    fn rule_set(&self) -> &'static str {
        PERMISSION_RULE_SET
    }

    fn check(&self, _op: Operation) -> Vec<FieldError> {
        let mut errors = FieldError::collect(self.validate());
        key_rules(&mut errors, &self.key);
        errors
    }
}

fn key_rules(errors: &mut Vec<FieldError>, key: &str) {
    require(errors, "key", key);

    if !key.is_empty() && !PERMISSION_KEY_RE.is_match(key) {
        errors.push(FieldError::new(
            "key",
            "format",
            "key must look like scheme://capability, e.g. uri://open/file",
        ));
    }
}

/// Update permission request
#[derive(Debug, Default, Deserialize)]
pub struct UpdatePermissionRequest {
    pub key: Option<String>,
    pub description: Option<String>,
    pub group: Option<String>,
}

impl UpdatePermissionRequest {
    pub fn apply(&self, permission: &mut Permission) {
        if let Some(key) = &self.key {
            permission.key = key.clone();
        }
        if let Some(description) = &self.description {
            permission.description = Some(description.clone());
        }
        if let Some(group) = &self.group {
            permission.group = Some(group.clone());
        }
    }
}

/// Permission check query
#[derive(Debug, Deserialize)]
pub struct CanQuery {
    pub key: String,
}
