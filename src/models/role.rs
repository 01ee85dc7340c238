//! Role domain models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::validation::{require, EntityKey, FieldError, Operation, RuleSet};

pub const ROLE_RULE_SET: &str = "role";

/// Role
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, Validate)]
pub struct Role {
    #[validate(range(min = 1, message = "id must be a positive integer"))]
    pub id: i64,
    #[validate(length(min = 1, max = 64, message = "name must be 1 to 64 characters"))]
    pub name: String,
    #[validate(length(max = 255, message = "description must be at most 255 characters"))]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RuleSet for Role {
    fn rule_set(&self) -> &'static str {
        ROLE_RULE_SET
    }

    fn check(&self, op: Operation) -> Vec<FieldError> {
        match op {
            Operation::Delete | Operation::Read => EntityKey::new(ROLE_RULE_SET, self.id).check(op),
            Operation::Create | Operation::Update => {
                let mut errors = FieldError::collect(self.validate());
                require(&mut errors, "name", &self.name);
                errors
            }
        }
    }
}

/// New role draft
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct NewRole {
    #[validate(length(min = 1, max = 64, message = "name must be 1 to 64 characters"))]
    pub name: String,
    #[validate(length(max = 255, message = "description must be at most 255 characters"))]
    pub description: Option<String>,
}

impl NewRole {
    pub fn new(name: &str, description: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            description: description.map(str::to_string),
        }
    }
}

impl RuleSet for NewRole {
    fn rule_set(&self) -> &'static str {
        ROLE_RULE_SET
    }

    fn check(&self, _op: Operation) -> Vec<FieldError> {
        let mut errors = FieldError::collect(self.validate());
        require(&mut errors, "name", &self.name);
        errors
    }
}

/// Update role request
#[derive(Debug, Default, Deserialize)]
pub struct UpdateRoleRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl UpdateRoleRequest {
    pub fn apply(&self, role: &mut Role) {
        if let Some(name) = &self.name {
            role.name = name.clone();
        }
        if let Some(description) = &self.description {
            role.description = Some(description.clone());
        }
    }
}
