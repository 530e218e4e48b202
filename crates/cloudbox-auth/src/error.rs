//! Authentication error taxonomy.
//!
//! Flows inside this crate return [`AuthError`]; it converts into
//! [`AppError`] at the crate boundary so handlers can use `?` directly.

use std::time::Duration;

use thiserror::Error;

use cloudbox_core::error::{AppError, ErrorKind};

/// Result alias for authentication flows.
pub type AuthResult<T> = Result<T, AuthError>;

/// Every way an authentication flow can fail.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Malformed token or bad signature.
    #[error("invalid token")]
    InvalidToken,
    /// Token signature is valid but its lifetime is over.
    #[error("token expired")]
    ExpiredToken,
    /// Token was explicitly revoked.
    #[error("token revoked")]
    Blacklisted,
    /// The refresh family was terminated after reuse was detected.
    #[error("token family compromised")]
    FamilyCompromised,
    /// Too many attempts in the current window.
    #[error("rate limit exceeded, retry in {}s", retry_after.as_secs())]
    RateLimited {
        /// Time until the window closes.
        retry_after: Duration,
    },
    /// A second factor is required but was not supplied.
    #[error("multi-factor code required")]
    MfaRequired,
    /// The supplied second-factor code did not verify.
    #[error("invalid multi-factor code")]
    MfaCodeInvalid,
    /// The user has no confirmed MFA enrollment.
    #[error("multi-factor authentication is not enrolled")]
    MfaNotEnrolled,
    /// Unknown identifier or wrong password.
    #[error("invalid credentials")]
    InvalidCredentials,
    /// The account exists but may not sign in.
    #[error("account disabled")]
    AccountDisabled,
    /// The revocation store failed or timed out.
    #[error("session store unavailable")]
    StoreUnavailable(#[source] AppError),
    /// Duplicate username or email.
    #[error("{0}")]
    Conflict(String),
    /// Input rejected.
    #[error("{0}")]
    Validation(String),
    /// Anything else.
    #[error("{0}")]
    Internal(#[source] AppError),
}

impl AuthError {
    /// Machine-readable code used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidToken | Self::ExpiredToken | Self::Blacklisted | Self::FamilyCompromised => {
                "INVALID_TOKEN"
            }
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::MfaRequired => "MFA_REQUIRED",
            Self::MfaCodeInvalid => "MFA_INVALID",
            Self::MfaNotEnrolled => "MFA_NOT_ENROLLED",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::AccountDisabled => "ACCOUNT_DISABLED",
            Self::StoreUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::Conflict(_) => "CONFLICT",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<AppError> for AuthError {
    fn from(err: AppError) -> Self {
        match err.kind {
            ErrorKind::Cache => Self::StoreUnavailable(err),
            ErrorKind::Conflict => Self::Conflict(err.message),
            ErrorKind::Validation => Self::Validation(err.message),
            _ => Self::Internal(err),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        let code = err.code();
        let message = err.to_string();
        match err {
            // Token denials share one message so callers cannot tell them apart.
            AuthError::InvalidToken
            | AuthError::ExpiredToken
            | AuthError::Blacklisted
            | AuthError::FamilyCompromised => {
                AppError::authentication("Invalid or expired token").with_code(code)
            }
            AuthError::RateLimited { retry_after } => {
                AppError::rate_limited("Too many requests", retry_after).with_code(code)
            }
            AuthError::MfaRequired
            | AuthError::MfaCodeInvalid
            | AuthError::MfaNotEnrolled
            | AuthError::InvalidCredentials => AppError::authentication(message).with_code(code),
            AuthError::AccountDisabled => {
                AppError::authorization("Account is disabled").with_code(code)
            }
            AuthError::StoreUnavailable(source) => AppError::with_source(
                ErrorKind::ServiceUnavailable,
                "Session store unavailable",
                source,
            )
            .with_code(code),
            AuthError::Conflict(detail) => AppError::conflict(detail).with_code(code),
            AuthError::Validation(detail) => AppError::validation(detail).with_code(code),
            AuthError::Internal(source) => {
                AppError::with_source(ErrorKind::Internal, source.message.clone(), source)
            }
        }
    }
}
