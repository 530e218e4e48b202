//! Multi-factor authentication configuration.

use serde::{Deserialize, Serialize};

/// TOTP and email-code settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MfaConfig {
    /// Issuer label shown in authenticator apps.
    #[serde(default = "default_issuer")]
    pub issuer: String,
    /// TOTP time-step length in seconds.
    #[serde(default = "default_step")]
    pub totp_step_seconds: u64,
    /// Number of adjacent steps accepted on each side of the current one.
    #[serde(default = "default_skew")]
    pub totp_skew_steps: u8,
    /// Lifetime of an emailed one-time code in seconds.
    #[serde(default = "default_email_ttl")]
    pub email_code_ttl_seconds: u64,
}

impl Default for MfaConfig {
    fn default() -> Self {
        Self {
            issuer: default_issuer(),
            totp_step_seconds: default_step(),
            totp_skew_steps: default_skew(),
            email_code_ttl_seconds: default_email_ttl(),
        }
    }
}

fn default_issuer() -> String {
    "Cloudbox".to_string()
}

fn default_step() -> u64 {
    30
}

fn default_skew() -> u8 {
    1
}

fn default_email_ttl() -> u64 {
    60
}
