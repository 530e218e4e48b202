//! Application state shared across all handlers and middleware.

use std::sync::Arc;
use std::time::Instant;

use cloudbox_auth::AuthServices;
use cloudbox_core::config::AppConfig;
use cloudbox_core::traits::store::RevocationStore;
use cloudbox_database::DatabasePool;

/// Application state containing all shared dependencies.
///
/// Passed to every Axum handler via `State<AppState>`.
/// All fields are cheap to clone across tasks.
#[derive(Debug, Clone)]
pub struct AppState {
    // ── Configuration ────────────────────────────────────────
    /// Application configuration
    pub config: Arc<AppConfig>,

    // ── Infrastructure ───────────────────────────────────────
    /// Revocation store (Redis or in-memory)
    pub store: Arc<dyn RevocationStore>,
    /// PostgreSQL pool, absent when the directory is not database-backed
    pub database: Option<DatabasePool>,

    // ── Auth ─────────────────────────────────────────────────
    /// Token, MFA, rate limit and session components
    pub auth: AuthServices,

    /// When the process started serving
    pub started_at: Instant,
}

impl AppState {
    /// Creates the state. Uptime is measured from this call.
    pub fn new(
        config: AppConfig,
        store: Arc<dyn RevocationStore>,
        database: Option<DatabasePool>,
        auth: AuthServices,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            database,
            auth,
            started_at: Instant::now(),
        }
    }
}
