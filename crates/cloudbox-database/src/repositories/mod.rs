//! Account repositories and the traits the auth crate consumes.

pub mod mfa;
pub mod user;

use async_trait::async_trait;
use uuid::Uuid;

use cloudbox_core::result::AppResult;
use cloudbox_entity::mfa::MfaEnrollment;
use cloudbox_entity::user::{NewUser, User};

pub use mfa::MfaEnrollmentRepository;
pub use user::UserRepository;

/// Relational user-identity lookup.
#[async_trait]
pub trait UserDirectory: Send + Sync + std::fmt::Debug + 'static {
    /// Find a user by primary key.
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>>;

    /// Find a user by username or email (case-insensitive).
    async fn find_by_identifier(&self, identifier: &str) -> AppResult<Option<User>>;

    /// Create a user. Fails with `Conflict` when the username or email is taken.
    async fn create_user(&self, data: &NewUser) -> AppResult<User>;

    /// Replace a user's password hash.
    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> AppResult<()>;

    /// Stamp a successful sign-in.
    async fn record_login(&self, user_id: Uuid) -> AppResult<()>;
}

/// Storage for TOTP enrollments.
#[async_trait]
pub trait MfaRepository: Send + Sync + std::fmt::Debug + 'static {
    /// Load the user's enrollment, if any.
    async fn get(&self, user_id: Uuid) -> AppResult<Option<MfaEnrollment>>;

    /// Insert or replace the user's enrollment.
    async fn save(&self, enrollment: &MfaEnrollment) -> AppResult<()>;

    /// Remove the user's enrollment. Returns `true` if one existed.
    async fn delete(&self, user_id: Uuid) -> AppResult<bool>;
}
