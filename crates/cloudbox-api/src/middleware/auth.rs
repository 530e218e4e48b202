//! Authentication gate middleware.
//!
//! Resolves the bearer token into a [`Principal`] and attaches it to the
//! request extensions. Never rejects; handlers that need a user use the
//! `AuthUser` extractor.

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;

use cloudbox_auth::Principal;

use crate::state::AppState;

/// Attach the caller's principal, if the request carries a usable token.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    // Never trust a principal that arrived from outside the gate.
    request.extensions_mut().remove::<Principal>();

    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let principal = state
        .auth
        .gate
        .authenticate(request.uri().path(), authorization)
        .await;
    if let Some(principal) = principal {
        request.extensions_mut().insert(principal);
    }

    next.run(request).await
}
