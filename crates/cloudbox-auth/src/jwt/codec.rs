//! Signs and parses compact HS256 tokens.
//!
//! Expiry is checked here against the injected clock rather than by
//! `jsonwebtoken`, so that an expired-but-authentic token still yields its
//! claims to the caller.

use std::sync::Arc;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use thiserror::Error;

use cloudbox_core::clock::Clock;
use cloudbox_core::error::AppError;

use super::claims::Claims;

/// Minimum accepted length of the signing secret, in bytes.
pub const MIN_SECRET_LEN: usize = cloudbox_core::config::auth::MIN_JWT_SECRET_LEN;

/// Why a token string could not be accepted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// Bad signature, wrong algorithm, or unparseable payload.
    #[error("token is malformed or its signature does not verify")]
    Invalid,
    /// Authentic token whose `exp` has passed. Carries the parsed claims.
    #[error("token has expired")]
    Expired(Box<Claims>),
}

/// Encodes and decodes signed tokens with a symmetric key.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &Algorithm::HS256)
            .finish()
    }
}

impl TokenCodec {
    /// Creates a codec. Rejects secrets shorter than [`MIN_SECRET_LEN`].
    pub fn new(secret: &str, clock: Arc<dyn Clock>) -> Result<Self, AppError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(AppError::configuration(format!(
                "auth.jwt_secret must be at least {MIN_SECRET_LEN} bytes"
            )));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            clock,
        })
    }

    /// Signs a claim set.
    pub fn encode(&self, claims: &Claims) -> Result<String, AppError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AppError::internal(format!("Failed to encode token: {e}")))
    }

    /// Verifies and parses a token string.
    pub fn decode(&self, token: &str) -> Result<Claims, DecodeError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|_| DecodeError::Invalid)?
            .claims;

        if claims.is_expired_at(self.clock.now_millis()) {
            return Err(DecodeError::Expired(Box::new(claims)));
        }
        Ok(claims)
    }
}
