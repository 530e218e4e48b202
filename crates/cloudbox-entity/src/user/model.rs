//! User entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::role::UserRole;
use super::status::UserStatus;

/// A registered Cloudbox account.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    /// Unique user identifier.
    pub id: Uuid,
    /// Unique login name.
    pub username: String,
    /// Email address, unique when present.
    pub email: Option<String>,
    /// Argon2 password hash. Absent for accounts created by social login.
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    /// Human-readable display name.
    pub display_name: Option<String>,
    /// Account role.
    pub role: UserRole,
    /// Account status.
    pub status: UserStatus,
    /// Account locked until this time (if locked).
    pub locked_until: Option<DateTime<Utc>>,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
    /// Last successful login time.
    pub last_login_at: Option<DateTime<Utc>>,
}

impl User {
    /// Check if the account is locked at `now`.
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        if self.status == UserStatus::Locked {
            return true;
        }
        matches!(self.locked_until, Some(until) if now < until)
    }

    /// Check if the user can sign in at `now`.
    pub fn can_login(&self, now: DateTime<Utc>) -> bool {
        self.status.can_login() && !self.is_locked(now)
    }

    /// Whether the given identifier names this account (username or email).
    pub fn matches_identifier(&self, identifier: &str) -> bool {
        self.username.eq_ignore_ascii_case(identifier)
            || self
                .email
                .as_deref()
                .is_some_and(|e| e.eq_ignore_ascii_case(identifier))
    }
}

/// Data required to create a new user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    /// Desired username.
    pub username: String,
    /// Email address (optional).
    pub email: Option<String>,
    /// Pre-hashed password.
    pub password_hash: Option<String>,
    /// Display name (optional).
    pub display_name: Option<String>,
    /// Assigned role.
    pub role: UserRole,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(status: UserStatus, locked_until: Option<DateTime<Utc>>) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            username: "alice".into(),
            email: Some("Alice@Example.com".into()),
            password_hash: Some("hash".into()),
            display_name: None,
            role: UserRole::Member,
            status,
            locked_until,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        }
    }

    #[test]
    fn test_lock_window() {
        let now = Utc::now();
        let user = sample(UserStatus::Active, Some(now + chrono::Duration::minutes(5)));
        assert!(!user.can_login(now));
        assert!(user.can_login(now + chrono::Duration::minutes(6)));
        assert!(!sample(UserStatus::Disabled, None).can_login(now));
    }

    #[test]
    fn test_identifier_match_is_case_insensitive() {
        let user = sample(UserStatus::Active, None);
        assert!(user.matches_identifier("ALICE"));
        assert!(user.matches_identifier("alice@example.com"));
        assert!(!user.matches_identifier("bob"));
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let json = serde_json::to_value(sample(UserStatus::Active, None)).unwrap();
        assert!(json.get("password_hash").is_none());
    }
}
