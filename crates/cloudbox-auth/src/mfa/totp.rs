//! RFC 6238 time-based codes.
//!
//! Secrets are 160-bit and stored base32-encoded. Verification accepts the
//! current step and `skew` steps on either side and reports which step
//! matched, so callers can refuse a second use of the same step.

use subtle::ConstantTimeEq;
use totp_rs::{Algorithm, Secret, TOTP};

use cloudbox_core::config::MfaConfig;
use cloudbox_core::error::AppError;

/// Code length.
pub const DIGITS: usize = 6;

const SECRET_BYTES: usize = 20;

/// Generates and checks TOTP codes.
#[derive(Debug, Clone, Copy)]
pub struct TotpEngine {
    step: u64,
    skew: u8,
}

impl TotpEngine {
    /// Creates an engine with the given step length and skew tolerance.
    pub fn new(step_seconds: u64, skew_steps: u8) -> Self {
        Self {
            step: step_seconds.max(1),
            skew: skew_steps,
        }
    }

    /// Creates an engine from configuration.
    pub fn from_config(config: &MfaConfig) -> Self {
        Self::new(config.totp_step_seconds, config.totp_skew_steps)
    }

    /// Step length in seconds.
    pub fn step(&self) -> u64 {
        self.step
    }

    /// How long a step stays acceptable: the whole skew window.
    pub fn acceptance_window(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.step * (2 * u64::from(self.skew) + 1))
    }

    /// Generate a fresh base32 secret.
    pub fn generate_secret(&self) -> Result<String, AppError> {
        let bytes: [u8; SECRET_BYTES] = rand::random();
        match Secret::Raw(bytes.to_vec()).to_encoded() {
            Secret::Encoded(encoded) => Ok(encoded),
            Secret::Raw(_) => Err(AppError::internal("Failed to encode TOTP secret")),
        }
    }

    /// The code for the step containing `unix_secs`.
    pub fn code_at(&self, secret: &str, unix_secs: u64) -> Option<String> {
        Some(self.totp(secret)?.generate(unix_secs))
    }

    /// Index of the step within the skew window whose code equals `code`.
    pub fn matching_step(&self, secret: &str, code: &str, unix_secs: u64) -> Option<u64> {
        if code.len() != DIGITS || !code.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let totp = self.totp(secret)?;
        let current = unix_secs / self.step;
        let skew = u64::from(self.skew);

        let mut matched = None;
        for step in current.saturating_sub(skew)..=current.saturating_add(skew) {
            let candidate = totp.generate(step * self.step);
            if bool::from(candidate.as_bytes().ct_eq(code.as_bytes())) {
                matched = Some(step);
            }
        }
        matched
    }

    /// Whether `code` is valid for `secret` at `unix_secs`.
    pub fn verify(&self, secret: &str, code: &str, unix_secs: u64) -> bool {
        self.matching_step(secret, code, unix_secs).is_some()
    }

    fn totp(&self, secret: &str) -> Option<TOTP> {
        let bytes = Secret::Encoded(secret.to_string()).to_bytes().ok()?;
        TOTP::new(Algorithm::SHA1, DIGITS, self.skew, self.step, bytes).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: u64 = 1_700_000_000;

    #[test]
    fn test_skew_tolerance() {
        let engine = TotpEngine::new(30, 1);
        let secret = engine.generate_secret().unwrap();

        let current = engine.code_at(&secret, NOW).unwrap();
        let early = engine.code_at(&secret, NOW - 30).unwrap();
        let late = engine.code_at(&secret, NOW + 30).unwrap();
        let far = engine.code_at(&secret, NOW + 90).unwrap();

        assert!(engine.verify(&secret, &current, NOW));
        assert!(engine.verify(&secret, &early, NOW));
        assert!(engine.verify(&secret, &late, NOW));
        if far != current && far != early && far != late {
            assert!(!engine.verify(&secret, &far, NOW));
        }
    }

    #[test]
    fn test_matching_step_identifies_step() {
        let engine = TotpEngine::new(30, 1);
        let secret = engine.generate_secret().unwrap();
        let code = engine.code_at(&secret, NOW).unwrap();
        assert_eq!(engine.matching_step(&secret, &code, NOW), Some(NOW / 30));
    }

    #[test]
    fn test_rejects_malformed_input() {
        let engine = TotpEngine::new(30, 1);
        let secret = engine.generate_secret().unwrap();
        assert!(!engine.verify(&secret, "12345", NOW));
        assert!(!engine.verify(&secret, "abcdef", NOW));
        assert!(!engine.verify("not base32!", "123456", NOW));
    }

    #[test]
    fn test_secret_is_160_bits() {
        let engine = TotpEngine::new(30, 1);
        let secret = engine.generate_secret().unwrap();
        let bytes = Secret::Encoded(secret).to_bytes().unwrap();
        assert_eq!(bytes.len(), SECRET_BYTES);
        assert_eq!(engine.acceptance_window(), std::time::Duration::from_secs(90));
    }
}
