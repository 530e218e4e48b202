//! Per-request authentication gate.
//!
//! The gate never rejects. It either resolves a [`Principal`] for the
//! request or leaves it anonymous; handlers that need a user enforce that
//! themselves. Nothing about why a token failed leaves this module.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use cloudbox_core::clock::Clock;
use cloudbox_core::config::GateConfig;
use cloudbox_database::repositories::UserDirectory;
use cloudbox_entity::user::UserRole;

use crate::jwt::{Claims, TokenType};
use crate::token::{TokenValidator, Verdict};

/// The authenticated caller attached to a request.
#[derive(Debug, Clone, Serialize)]
pub struct Principal {
    /// User id.
    pub user_id: Uuid,
    /// Login name.
    pub username: String,
    /// Email address.
    pub email: Option<String>,
    /// Account role.
    pub role: UserRole,
    /// Claims of the access token that authenticated the request.
    #[serde(skip)]
    pub claims: Claims,
}

/// Path patterns exempt from authentication.
#[derive(Debug, Clone, Default)]
pub struct PublicPaths {
    exact: Vec<String>,
    prefixes: Vec<String>,
}

impl PublicPaths {
    /// Builds the matcher. A pattern ending in `*` matches by prefix.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut paths = Self::default();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            match pattern.strip_suffix('*') {
                Some(prefix) => paths.prefixes.push(prefix.to_string()),
                None => paths.exact.push(pattern.to_string()),
            }
        }
        paths
    }

    /// Builds the matcher from configuration.
    pub fn from_config(config: &GateConfig) -> Self {
        Self::new(&config.public_paths)
    }

    /// Whether `path` skips authentication.
    pub fn is_public(&self, path: &str) -> bool {
        self.exact.iter().any(|p| p == path) || self.prefixes.iter().any(|p| path.starts_with(p))
    }
}

/// Resolves bearer tokens into principals.
#[derive(Debug, Clone)]
pub struct AuthenticationGate {
    validator: Arc<TokenValidator>,
    directory: Arc<dyn UserDirectory>,
    public_paths: PublicPaths,
    clock: Arc<dyn Clock>,
}

impl AuthenticationGate {
    /// Creates a new gate.
    pub fn new(
        validator: Arc<TokenValidator>,
        directory: Arc<dyn UserDirectory>,
        public_paths: PublicPaths,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            validator,
            directory,
            public_paths,
            clock,
        }
    }

    /// Whether `path` is exempt from authentication.
    pub fn is_public(&self, path: &str) -> bool {
        self.public_paths.is_public(path)
    }

    /// Resolve the caller of a request, if any.
    ///
    /// Returns `None` for public paths, missing or malformed headers, any
    /// token denial, unknown users, and accounts that may not sign in.
    pub async fn authenticate(
        &self,
        path: &str,
        authorization: Option<&str>,
    ) -> Option<Principal> {
        if self.is_public(path) {
            return None;
        }
        let token = bearer_token(authorization?)?;

        let claims = match self.validator.validate_as(token, TokenType::Access).await {
            Verdict::Authorized(validated) => validated.claims,
            Verdict::Denied(_) => return None,
        };

        let user = match self.directory.find_by_id(claims.sub).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                debug!(user_id = %claims.sub, "Token subject no longer exists");
                return None;
            }
            Err(e) => {
                warn!(user_id = %claims.sub, error = %e, "User lookup failed during authentication");
                return None;
            }
        };
        if !user.can_login(self.clock.now()) {
            debug!(user_id = %user.id, "Token subject may not sign in");
            return None;
        }

        Some(Principal {
            user_id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            claims,
        })
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
