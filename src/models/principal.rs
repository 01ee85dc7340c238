//! Resolved identity for one request

use serde::Serialize;
use std::collections::BTreeSet;

use super::{role::Role, user::User};

/// A user together with the role ids and permission keys granted to it.
///
/// Checks are evaluated against this snapshot, so a handler sees one
/// consistent view of the graph for the whole request.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user: User,
    pub roles: Vec<Role>,
    pub permissions: BTreeSet<String>,
    admin_role_id: i64,
    guest_user_id: i64,
}

impl Principal {
    pub fn new(
        user: User,
        roles: Vec<Role>,
        permissions: impl IntoIterator<Item = String>,
        admin_role_id: i64,
        guest_user_id: i64,
    ) -> Self {
        Self {
            user,
            roles,
            permissions: permissions.into_iter().collect(),
            admin_role_id,
            guest_user_id,
        }
    }

    pub fn id(&self) -> i64 {
        self.user.id
    }

    /// Exact, case-sensitive key match against the granted permissions
    pub fn can(&self, key: &str) -> bool {
        self.permissions.contains(key)
    }

    /// Membership in the configured admin role, independent of grants
    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| r.id == self.admin_role_id)
    }

    pub fn is_guest(&self) -> bool {
        self.user.id == self.guest_user_id
    }

    pub fn role_ids(&self) -> BTreeSet<i64> {
        self.roles.iter().map(|r| r.id).collect()
    }
}

/// Principal response
#[derive(Debug, Serialize)]
pub struct PrincipalResponse {
    pub user: User,
    pub roles: Vec<Role>,
    pub permissions: Vec<String>,
    pub is_admin: bool,
    pub is_guest: bool,
}

impl From<Principal> for PrincipalResponse {
    fn from(principal: Principal) -> Self {
        let is_admin = principal.is_admin();
        let is_guest = principal.is_guest();
        Self {
            user: principal.user,
            roles: principal.roles,
            permissions: principal.permissions.into_iter().collect(),
            is_admin,
            is_guest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sqlx::types::Json;

    fn user(id: i64) -> User {
        User {
            id,
            username: format!("user{id}"),
            email: format!("user{id}@example.com"),
            password_hash: String::new(),
            is_active: true,
            meta: Json(serde_json::json!({})),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn role(id: i64, name: &str) -> Role {
        Role {
            id,
            name: name.to_string(),
            description: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_can_is_exact_and_case_sensitive() {
        let p = Principal::new(
            user(2),
            vec![role(3, "editor")],
            vec!["uri://open/file".to_string()],
            1,
            1,
        );

        assert!(p.can("uri://open/file"));
        assert!(!p.can("uri://OPEN/file"));
        assert!(!p.can("uri://open"));
        assert!(!p.can("uri://open/file/"));
    }

    #[test]
    fn test_admin_is_role_membership() {
        let admin = Principal::new(user(2), vec![role(1, "admin")], Vec::new(), 1, 9);
        assert!(admin.is_admin());
        assert!(!admin.can("uri://open/file"));

        let editor = Principal::new(
            user(3),
            vec![role(4, "admin")],
            vec!["uri://open/file".to_string()],
            1,
            9,
        );
        assert!(!editor.is_admin());
    }

    #[test]
    fn test_guest_flag() {
        let guest = Principal::new(user(1), Vec::new(), Vec::new(), 1, 1);
        assert!(guest.is_guest());

        let response = PrincipalResponse::from(guest);
        assert!(response.is_guest);
        assert!(!response.is_admin);
        assert!(response.permissions.is_empty());
    }
}
