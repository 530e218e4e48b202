//! Auth handlers: login, signup, refresh, logout, me, password change and reset.

use axum::Json;
use axum::extract::State;

use cloudbox_auth::session::SignupRequest as NewAccount;

use crate::dto::request::{
    ChangePasswordRequest, LoginRequest, LogoutRequest, PasswordResetConfirmRequest,
    PasswordResetRequest, RefreshRequest, SignupRequest,
};
use crate::dto::response::{
    ApiResponse, LoginResponse, MeResponse, MessageResponse, PasswordResetResponse, TokenResponse,
};
use crate::dto::validate;
use crate::error::ApiResult;
use crate::extractors::{AuthUser, ClientAddr};
use crate::state::AppState;

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<ApiResponse<LoginResponse>>> {
    validate(&req)?;

    let session = state
        .auth
        .sessions
        .login(
            &req.identifier,
            &req.password,
            req.totp_code.as_deref(),
            req.remember_me,
        )
        .await?;

    Ok(Json(ApiResponse::ok(LoginResponse {
        tokens: session.tokens.into(),
        user: session.user.into(),
    })))
}

/// POST /api/auth/signup
pub async fn signup(
    State(state): State<AppState>,
    client: ClientAddr,
    Json(req): Json<SignupRequest>,
) -> ApiResult<Json<ApiResponse<LoginResponse>>> {
    validate(&req)?;

    let session = state
        .auth
        .sessions
        .signup(
            NewAccount {
                username: req.username,
                email: req.email,
                password: req.password,
                display_name: req.display_name,
            },
            client.as_str(),
        )
        .await?;

    Ok(Json(ApiResponse::ok(LoginResponse {
        tokens: session.tokens.into(),
        user: session.user.into(),
    })))
}

/// POST /api/auth/refresh
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<ApiResponse<TokenResponse>>> {
    let tokens = state.auth.sessions.refresh(&req.refresh_token).await?;
    Ok(Json(ApiResponse::ok(tokens.into())))
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    auth: AuthUser,
    body: Option<Json<LogoutRequest>>,
) -> ApiResult<Json<ApiResponse<MessageResponse>>> {
    let refresh_token = body.and_then(|Json(req)| req.refresh_token);
    state
        .auth
        .sessions
        .logout(&auth.claims, refresh_token.as_deref())
        .await?;

    Ok(Json(ApiResponse::ok(MessageResponse::new(
        "Logged out successfully",
    ))))
}

/// GET /api/auth/me
pub async fn me(auth: AuthUser) -> Json<ApiResponse<MeResponse>> {
    Json(ApiResponse::ok(MeResponse::from(auth.principal())))
}

/// PUT /api/auth/password
pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<Json<ApiResponse<TokenResponse>>> {
    validate(&req)?;

    let tokens = state
        .auth
        .sessions
        .change_password(auth.user_id, &req.current_password, &req.new_password)
        .await?;
    Ok(Json(ApiResponse::ok(tokens.into())))
}

/// POST /api/auth/password-reset
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(req): Json<PasswordResetRequest>,
) -> ApiResult<Json<ApiResponse<PasswordResetResponse>>> {
    validate(&req)?;

    let reset_id = state
        .auth
        .sessions
        .request_password_reset(&req.identifier)
        .await?;
    Ok(Json(ApiResponse::ok(PasswordResetResponse { reset_id })))
}

/// POST /api/auth/password-reset/confirm
pub async fn confirm_password_reset(
    State(state): State<AppState>,
    Json(req): Json<PasswordResetConfirmRequest>,
) -> ApiResult<Json<ApiResponse<MessageResponse>>> {
    validate(&req)?;

    state
        .auth
        .sessions
        .confirm_password_reset(&req.reset_id, &req.code, &req.new_password)
        .await?;
    Ok(Json(ApiResponse::ok(MessageResponse::new(
        "Password has been reset",
    ))))
}
