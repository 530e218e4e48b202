//! Request DTOs with validation.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Login request body.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    /// Username or email.
    #[validate(length(min = 1, message = "Identifier is required"))]
    pub identifier: String,
    /// Password.
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
    /// Current TOTP code, required when MFA is enabled.
    #[serde(default)]
    pub totp_code: Option<String>,
    /// Ask for the long-lived refresh lifetime.
    #[serde(default)]
    pub remember_me: bool,
}

/// Signup request body.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SignupRequest {
    /// Desired username.
    #[validate(length(min = 3, max = 32))]
    pub username: String,
    /// Email.
    #[validate(email)]
    pub email: Option<String>,
    /// Password.
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
    /// Display name.
    #[validate(length(max = 100))]
    pub display_name: Option<String>,
}

/// Token refresh request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshRequest {
    /// Refresh token.
    pub refresh_token: String,
}

/// Logout request body. The refresh token is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogoutRequest {
    /// Refresh token whose family should end with this session.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Password change request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    /// Current password.
    #[validate(length(min = 1))]
    pub current_password: String,
    /// New password.
    #[validate(length(min = 1))]
    pub new_password: String,
}

/// Password reset request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PasswordResetRequest {
    /// Username or email.
    #[validate(length(min = 1, message = "Identifier is required"))]
    pub identifier: String,
}

/// Password reset confirmation.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PasswordResetConfirmRequest {
    /// Ticket id returned by the reset request.
    #[validate(length(min = 1))]
    pub reset_id: String,
    /// Code delivered to the user.
    #[validate(length(min = 1))]
    pub code: String,
    /// New password.
    #[validate(length(min = 1))]
    pub new_password: String,
}

/// A one-time code (TOTP or email).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CodeRequest {
    /// The code.
    #[validate(length(min = 1, max = 16))]
    pub code: String,
}
