//! User repository implementation.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use cloudbox_core::error::{AppError, ErrorKind};
use cloudbox_core::result::AppResult;
use cloudbox_entity::user::{NewUser, User};

use super::UserDirectory;

/// Repository for user lookups and credential updates.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new user repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for UserRepository {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find user by id", e))
    }

    async fn find_by_identifier(&self, identifier: &str) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE LOWER(username) = LOWER($1) OR LOWER(email) = LOWER($1) \
             LIMIT 1",
        )
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to find user by identifier", e)
        })
    }

    async fn create_user(&self, data: &NewUser) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            "INSERT INTO users (id, username, email, password_hash, display_name, role) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(&data.username)
        .bind(&data.email)
        .bind(&data.password_hash)
        .bind(&data.display_name)
        .bind(data.role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            let conflict = match &e {
                sqlx::Error::Database(db_err) => {
                    unique_violation(db_err.constraint(), &data.username)
                }
                _ => None,
            };
            conflict.unwrap_or_else(|| {
                AppError::with_source(ErrorKind::Database, "Failed to create user", e)
            })
        })
    }

    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> AppResult<()> {
        let result =
            sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
                .bind(user_id)
                .bind(password_hash)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Failed to update password", e)
                })?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("User {user_id} not found")));
        }
        Ok(())
    }

    async fn record_login(&self, user_id: Uuid) -> AppResult<()> {
        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to record login", e))?;
        Ok(())
    }
}

/// Conflict error for a unique violation on `users`, matched by constraint
/// or index name. Usernames and emails are unique case-insensitively too.
fn unique_violation(constraint: Option<&str>, username: &str) -> Option<AppError> {
    match constraint? {
        "users_username_key" | "idx_users_username_lower" => Some(AppError::conflict(format!(
            "Username '{username}' already exists"
        ))),
        "users_email_key" | "idx_users_email_lower" => {
            Some(AppError::conflict("Email already in use"))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_indexes_are_conflicts() {
        for constraint in [
            "users_username_key",
            "idx_users_username_lower",
            "users_email_key",
            "idx_users_email_lower",
        ] {
            let err = unique_violation(Some(constraint), "Alice").unwrap();
            assert_eq!(err.kind, ErrorKind::Conflict, "{constraint}");
        }
        assert!(
            unique_violation(Some("idx_users_username_lower"), "Alice")
                .unwrap()
                .message
                .contains("Alice")
        );
    }

    #[test]
    fn test_other_violations_are_not_conflicts() {
        assert!(unique_violation(Some("mfa_enrollments_pkey"), "alice").is_none());
        assert!(unique_violation(None, "alice").is_none());
    }
}
