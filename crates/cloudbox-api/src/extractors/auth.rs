//! `AuthUser` extractor: the principal the authentication gate attached.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use cloudbox_auth::Principal;
use cloudbox_core::error::AppError;

use crate::error::ApiError;

/// Authenticated caller available in handlers.
///
/// Rejects with 401 when the gate left the request anonymous.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Principal);

impl AuthUser {
    /// Returns the inner `Principal`.
    pub fn principal(&self) -> &Principal {
        &self.0
    }
}

impl std::ops::Deref for AuthUser {
    type Target = Principal;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(|| {
                ApiError(AppError::authentication("Authentication required").with_code("UNAUTHORIZED"))
            })
    }
}
