//! MFA enrollment repository implementation.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use cloudbox_core::error::{AppError, ErrorKind};
use cloudbox_core::result::AppResult;
use cloudbox_entity::mfa::MfaEnrollment;

use super::MfaRepository;

/// Repository for the `mfa_enrollments` table.
#[derive(Debug, Clone)]
pub struct MfaEnrollmentRepository {
    pool: PgPool,
}

impl MfaEnrollmentRepository {
    /// Create a new enrollment repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MfaRepository for MfaEnrollmentRepository {
    async fn get(&self, user_id: Uuid) -> AppResult<Option<MfaEnrollment>> {
        sqlx::query_as::<_, MfaEnrollment>("SELECT * FROM mfa_enrollments WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to load MFA enrollment", e)
            })
    }

    async fn save(&self, enrollment: &MfaEnrollment) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO mfa_enrollments (user_id, secret, enabled, verified_at, created_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (user_id) DO UPDATE SET \
                secret = EXCLUDED.secret, \
                enabled = EXCLUDED.enabled, \
                verified_at = EXCLUDED.verified_at",
        )
        .bind(enrollment.user_id)
        .bind(&enrollment.secret)
        .bind(enrollment.enabled)
        .bind(enrollment.verified_at)
        .bind(enrollment.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to save MFA enrollment", e))?;
        Ok(())
    }

    async fn delete(&self, user_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM mfa_enrollments WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to delete MFA enrollment", e)
            })?;
        Ok(result.rows_affected() > 0)
    }
}
