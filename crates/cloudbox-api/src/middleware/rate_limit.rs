//! API-wide rate limiting.
//!
//! Counts every request in the `api` scope, keyed by the authenticated user
//! when the gate resolved one and by client address otherwise. The limiter
//! fails open, so a store outage never blocks traffic here.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use cloudbox_auth::{Principal, RateScope};

use crate::error::ApiError;
use crate::extractors::ClientAddr;
use crate::state::AppState;

/// Reject the request with 429 once its key exhausts the `api` window.
pub async fn api_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let key = match request.extensions().get::<Principal>() {
        Some(principal) => format!("user:{}", principal.user_id),
        None => format!(
            "ip:{}",
            ClientAddr::resolve(
                request.headers(),
                request.extensions(),
                &state.config.server.trusted_proxies,
            )
            .as_str()
        ),
    };

    match state.auth.limiter.enforce(RateScope::Api, &key).await {
        Ok(()) => next.run(request).await,
        Err(e) => ApiError::from(e).into_response(),
    }
}
