//! MFA handlers: TOTP enrollment and email codes.

use axum::Json;
use axum::extract::State;

use cloudbox_auth::mfa::MfaSetup;

use crate::dto::request::CodeRequest;
use crate::dto::response::{ApiResponse, CodeVerificationResponse, MessageResponse};
use crate::dto::validate;
use crate::error::ApiResult;
use crate::extractors::AuthUser;
use crate::state::AppState;

/// POST /api/auth/mfa/enroll
pub async fn enroll(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ApiResponse<MfaSetup>>> {
    let setup = state.auth.mfa.enroll(auth.user_id).await?;
    Ok(Json(ApiResponse::ok(setup)))
}

/// POST /api/auth/mfa/enable
pub async fn enable(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CodeRequest>,
) -> ApiResult<Json<ApiResponse<MessageResponse>>> {
    validate(&req)?;
    state.auth.mfa.enable(auth.user_id, &req.code).await?;
    Ok(Json(ApiResponse::ok(MessageResponse::new("MFA enabled"))))
}

/// POST /api/auth/mfa/disable
pub async fn disable(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CodeRequest>,
) -> ApiResult<Json<ApiResponse<MessageResponse>>> {
    validate(&req)?;
    state.auth.mfa.disable(auth.user_id, &req.code).await?;
    Ok(Json(ApiResponse::ok(MessageResponse::new("MFA disabled"))))
}

/// POST /api/auth/email-code/send
pub async fn send_email_code(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ApiResponse<MessageResponse>>> {
    // The code travels only through the sender.
    state.auth.mfa.issue_email_code(auth.user_id).await?;
    Ok(Json(ApiResponse::ok(MessageResponse::new("Code sent"))))
}

/// POST /api/auth/email-code/verify
pub async fn verify_email_code(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CodeRequest>,
) -> ApiResult<Json<ApiResponse<CodeVerificationResponse>>> {
    validate(&req)?;
    let verified = state
        .auth
        .mfa
        .verify_email_code(auth.user_id, &req.code)
        .await?;
    Ok(Json(ApiResponse::ok(CodeVerificationResponse { verified })))
}
