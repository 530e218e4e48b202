//! Cloudbox Server: token lifecycle and session API.
//!
//! Main entry point that wires all crates together and starts the server.

mod notifier;

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

use cloudbox_api::AppState;
use cloudbox_auth::{AuthServices, PasswordHasher};
use cloudbox_cache::StoreManager;
use cloudbox_core::clock::{Clock, SystemClock};
use cloudbox_core::config::AppConfig;
use cloudbox_core::error::AppError;
use cloudbox_database::DatabasePool;

use crate::notifier::TracingCodeSender;

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Load `config/default.toml`, the `CLOUDBOX_ENV` overlay and `CLOUDBOX__*` variables.
fn load_configuration() -> Result<AppConfig, AppError> {
    let env = std::env::var("CLOUDBOX_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting Cloudbox v{}", env!("CARGO_PKG_VERSION"));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // ── Step 1: Database connection + migrations ─────────────────
    let database = DatabasePool::connect(&config.database).await?;
    cloudbox_database::migration::run_migrations(database.pool()).await?;

    // ── Step 2: Revocation store ─────────────────────────────────
    tracing::info!(provider = %config.cache.provider, "Initializing revocation store");
    let store = StoreManager::new(&config.cache, Arc::clone(&clock)).await?;
    let sweeper = store.spawn_sweeper(Duration::from_secs(
        config.cache.memory.sweep_interval_seconds.max(1),
    ));

    // ── Step 3: Auth system ──────────────────────────────────────
    tracing::info!("Initializing authentication system...");
    let auth = AuthServices::new(
        &config,
        store.store(),
        Arc::clone(&clock),
        database.user_directory(),
        database.mfa_repository(),
        Arc::new(TracingCodeSender),
        PasswordHasher::new(),
    )?;

    // ── Step 4: Serve until shutdown ─────────────────────────────
    let state = AppState::new(config, store.store(), Some(database.clone()), auth);
    let result = cloudbox_api::serve(state).await;

    // ── Step 5: Cleanup ──────────────────────────────────────────
    if let Some(handle) = sweeper {
        handle.abort();
    }
    database.close().await;
    tracing::info!("Cloudbox stopped");

    result
}
