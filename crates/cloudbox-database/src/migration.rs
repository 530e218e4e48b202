//! Database migration runner.

use sqlx::PgPool;
use tracing::info;

use cloudbox_core::error::{AppError, ErrorKind};

/// Apply pending account-schema migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), AppError> {
    info!("Applying account schema migrations");

    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::Database,
                format!("Failed to run migrations: {e}"),
                e,
            )
        })?;

    info!("Account schema is up to date");
    Ok(())
}
