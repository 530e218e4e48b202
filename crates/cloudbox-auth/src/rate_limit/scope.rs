//! Rate-limit scopes.

use cloudbox_core::config::{RateLimitConfig, ScopeLimit};

/// What a counter limits. Each scope has its own budget and key namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateScope {
    /// Login attempts, keyed by lower-cased identifier.
    Login,
    /// Signups, keyed by client IP.
    Signup,
    /// Password reset requests, keyed by identifier.
    PasswordReset,
    /// Generic API calls, keyed by user id or client address.
    Api,
    /// Guesses against a single reset ticket, keyed by ticket id.
    ResetToken,
    /// MFA code submissions, keyed by user id.
    MfaVerify,
    /// Email codes sent, keyed by user id.
    EmailCode,
}

impl RateScope {
    /// Returns the string representation used in store keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Signup => "signup",
            Self::PasswordReset => "password_reset",
            Self::Api => "api",
            Self::ResetToken => "reset_token",
            Self::MfaVerify => "mfa_verify",
            Self::EmailCode => "email_code",
        }
    }

    /// The configured budget for this scope.
    pub fn limit(&self, config: &RateLimitConfig) -> ScopeLimit {
        match self {
            Self::Login => config.login,
            Self::Signup => config.signup,
            Self::PasswordReset => config.password_reset,
            Self::Api => config.api,
            Self::ResetToken => config.reset_token,
            Self::MfaVerify => config.mfa_verify,
            Self::EmailCode => config.email_code,
        }
    }
}

impl std::fmt::Display for RateScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_windows() {
        let config = RateLimitConfig::default();
        assert_eq!(RateScope::Login.limit(&config).window_seconds, 60);
        assert_eq!(RateScope::Signup.limit(&config).window_seconds, 3_600);
        assert_eq!(RateScope::PasswordReset.limit(&config).window_seconds, 86_400);
        assert_eq!(RateScope::ResetToken.limit(&config), ScopeLimit::new(3, 900));
    }
}
