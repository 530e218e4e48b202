//! Health check handler.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use tracing::warn;

use crate::dto::response::{ApiResponse, ComponentHealth, HealthResponse};
use crate::state::AppState;

/// GET /api/health
///
/// Responds 503 when the revocation store or database does not answer.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<ApiResponse<HealthResponse>>) {
    let store_ok = match state.store.health_check().await {
        Ok(ok) => ok,
        Err(e) => {
            warn!(error = %e, "Revocation store health check failed");
            false
        }
    };

    let database = match &state.database {
        Some(db) => {
            let healthy = match db.health_check().await {
                Ok(ok) => ok,
                Err(e) => {
                    warn!(error = %e, "Database health check failed");
                    false
                }
            };
            Some(ComponentHealth {
                provider: "postgres".to_string(),
                healthy,
            })
        }
        None => None,
    };

    let healthy = store_ok && database.as_ref().is_none_or(|d| d.healthy);
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ApiResponse::ok(HealthResponse {
            status: if healthy { "ok" } else { "degraded" }.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: state.started_at.elapsed().as_secs(),
            store: ComponentHealth {
                provider: state.store.provider_name().to_string(),
                healthy: store_ok,
            },
            database,
        })),
    )
}
