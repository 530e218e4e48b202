//! Route definitions for the Cloudbox HTTP API.
//!
//! All routes are organized by domain and mounted under `/api`.
//! The router receives `AppState` and passes it to all handlers via Axum's `State` extractor.

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post, put},
};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware;
use crate::state::AppState;

/// Build the complete Axum router with all routes and middleware.
///
/// Middleware runs outermost first: trace, request logging, authentication
/// gate, API rate limit.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .merge(auth_routes())
        .merge(mfa_routes())
        .merge(health_routes());

    Router::new()
        .nest("/api", api_routes)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit::api_rate_limit,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::authenticate,
        ))
        .layer(axum_middleware::from_fn(
            middleware::logging::request_logging,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Auth endpoints: login, signup, refresh, logout, me, password flows
fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/signup", post(handlers::auth::signup))
        .route("/auth/refresh", post(handlers::auth::refresh))
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/me", get(handlers::auth::me))
        .route("/auth/password", put(handlers::auth::change_password))
        .route(
            "/auth/password-reset",
            post(handlers::auth::request_password_reset),
        )
        .route(
            "/auth/password-reset/confirm",
            post(handlers::auth::confirm_password_reset),
        )
}

/// TOTP enrollment and email codes
fn mfa_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/mfa/enroll", post(handlers::mfa::enroll))
        .route("/auth/mfa/enable", post(handlers::mfa::enable))
        .route("/auth/mfa/disable", post(handlers::mfa::disable))
        .route(
            "/auth/email-code/send",
            post(handlers::mfa::send_email_code),
        )
        .route(
            "/auth/email-code/verify",
            post(handlers::mfa::verify_email_code),
        )
}

/// Liveness and dependency health
fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health::health))
}
