//! User model.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// User entity
#[derive(Clone, FromRow, Serialize)]
pub struct User {
    pub id: i64,
    pub login: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

redacted_debug!(User {
    show id,
    show login,
    show email,
    redact password_hash,
    show first_name,
    show last_name,
});

/// Non-secret subset of a user record, returned by a successful
/// authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticatedUser {
    pub id: i64,
    pub login: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl From<User> for AuthenticatedUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            login: user.login,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_user() -> User {
        User {
            id: 7,
            login: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: "$2b$12$abcdefghijklmnopqrstuv".to_string(),
            first_name: Some("Alice".to_string()),
            last_name: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_debug_redacts_password_hash() {
        let output = format!("{:?}", make_user());
        assert!(output.contains("alice"));
        assert!(!output.contains("$2b$12$"));
        assert!(output.contains("[REDACTED]"));
    }

    #[test]
    fn test_serialize_skips_password_hash() {
        let json = serde_json::to_value(make_user()).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["login"], "alice");
    }

    #[test]
    fn test_authenticated_user_from_user() {
        let profile = AuthenticatedUser::from(make_user());
        assert_eq!(profile.id, 7);
        assert_eq!(profile.login, "alice");
        assert_eq!(profile.first_name.as_deref(), Some("Alice"));
        assert!(profile.last_name.is_none());
    }
}
