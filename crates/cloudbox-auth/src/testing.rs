//! In-memory collaborators and a fully wired harness for tests.
//!
//! Everything runs over the in-memory store and a [`ManualClock`], so
//! windows and expiries are driven by advancing the clock.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use argon2::Params;
use async_trait::async_trait;
use chrono::DateTime;
use uuid::Uuid;

use cloudbox_cache::memory::MemoryRevocationStore;
use cloudbox_core::clock::{Clock, ManualClock};
use cloudbox_core::config::{
    AppConfig, AuthConfig, CacheConfig, DatabaseConfig, GateConfig, LoggingConfig, MfaConfig,
    RateLimitConfig, ServerConfig,
};
use cloudbox_core::error::AppError;
use cloudbox_core::result::AppResult;
use cloudbox_core::traits::notifier::{CodePurpose, CodeSender};
use cloudbox_core::traits::store::{CompareAndSwapOutcome, RevocationStore, WindowCount};
use cloudbox_database::repositories::{MfaRepository, UserDirectory};
use cloudbox_entity::mfa::MfaEnrollment;
use cloudbox_entity::user::{NewUser, User, UserRole, UserStatus};

use crate::password::PasswordHasher;
use crate::session::AuthServices;

/// Signing secret used by test configurations.
pub const TEST_SECRET: &str = "cloudbox-test-secret-0123456789abcdef";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Configuration with test defaults and no external endpoints.
pub fn test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig::default(),
        database: DatabaseConfig {
            url: "postgres://localhost/cloudbox_test".to_string(),
            max_connections: 1,
            min_connections: 0,
            connect_timeout_seconds: 1,
            idle_timeout_seconds: 1,
        },
        cache: CacheConfig::default(),
        auth: AuthConfig::with_secret(TEST_SECRET),
        rate_limit: RateLimitConfig::default(),
        mfa: MfaConfig::default(),
        gate: GateConfig::default(),
        logging: LoggingConfig::default(),
    }
}

/// Argon2 hasher with minimal cost so tests stay fast.
pub fn cheap_hasher() -> PasswordHasher {
    match Params::new(Params::MIN_M_COST, Params::MIN_T_COST, Params::MIN_P_COST, None) {
        Ok(params) => PasswordHasher::with_params(params),
        Err(_) => PasswordHasher::new(),
    }
}

// ── User directory ─────────────────────────────────────────

/// [`UserDirectory`] over a hash map.
#[derive(Debug)]
pub struct InMemoryUserDirectory {
    users: Mutex<HashMap<Uuid, User>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryUserDirectory {
    /// Creates an empty directory.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Change an account's status.
    pub fn set_status(&self, user_id: Uuid, status: UserStatus) {
        if let Some(user) = lock(&self.users).get_mut(&user_id) {
            user.status = status;
        }
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(lock(&self.users).get(&id).cloned())
    }

    async fn find_by_identifier(&self, identifier: &str) -> AppResult<Option<User>> {
        Ok(lock(&self.users)
            .values()
            .find(|u| u.matches_identifier(identifier))
            .cloned())
    }

    async fn create_user(&self, data: &NewUser) -> AppResult<User> {
        let mut users = lock(&self.users);
        if users.values().any(|u| u.username.eq_ignore_ascii_case(&data.username)) {
            return Err(AppError::conflict("Username is already taken"));
        }
        let email_taken = data.email.as_deref().is_some_and(|email| {
            users
                .values()
                .any(|u| u.email.as_deref().is_some_and(|e| e.eq_ignore_ascii_case(email)))
        });
        if email_taken {
            return Err(AppError::conflict("Email is already registered"));
        }

        let now = self.clock.now();
        let user = User {
            id: Uuid::now_v7(),
            username: data.username.clone(),
            email: data.email.clone(),
            password_hash: data.password_hash.clone(),
            display_name: data.display_name.clone(),
            role: data.role,
            status: UserStatus::Active,
            locked_until: None,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> AppResult<()> {
        let mut users = lock(&self.users);
        let user = users
            .get_mut(&user_id)
            .ok_or_else(|| AppError::not_found(format!("User {user_id} not found")))?;
        user.password_hash = Some(password_hash.to_string());
        user.updated_at = self.clock.now();
        Ok(())
    }

    async fn record_login(&self, user_id: Uuid) -> AppResult<()> {
        if let Some(user) = lock(&self.users).get_mut(&user_id) {
            user.last_login_at = Some(self.clock.now());
        }
        Ok(())
    }
}

// ── MFA repository ─────────────────────────────────────────

/// [`MfaRepository`] over a hash map.
#[derive(Debug, Default)]
pub struct InMemoryMfaRepository {
    enrollments: Mutex<HashMap<Uuid, MfaEnrollment>>,
}

#[async_trait]
impl MfaRepository for InMemoryMfaRepository {
    async fn get(&self, user_id: Uuid) -> AppResult<Option<MfaEnrollment>> {
        Ok(lock(&self.enrollments).get(&user_id).cloned())
    }

    async fn save(&self, enrollment: &MfaEnrollment) -> AppResult<()> {
        lock(&self.enrollments).insert(enrollment.user_id, enrollment.clone());
        Ok(())
    }

    async fn delete(&self, user_id: Uuid) -> AppResult<bool> {
        Ok(lock(&self.enrollments).remove(&user_id).is_some())
    }
}

// ── Code sender ────────────────────────────────────────────

/// A code handed to the [`RecordingCodeSender`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentCode {
    /// Recipient.
    pub user_id: Uuid,
    /// Why it was sent.
    pub purpose: CodePurpose,
    /// The code itself.
    pub code: String,
}

/// [`CodeSender`] that remembers everything it was asked to send.
#[derive(Debug, Default)]
pub struct RecordingCodeSender {
    sent: Mutex<Vec<SentCode>>,
}

impl RecordingCodeSender {
    /// Every code sent so far, oldest first.
    pub fn sent(&self) -> Vec<SentCode> {
        lock(&self.sent).clone()
    }

    /// The most recent code sent for `purpose`.
    pub fn last_code(&self, purpose: CodePurpose) -> Option<String> {
        lock(&self.sent)
            .iter()
            .rev()
            .find(|s| s.purpose == purpose)
            .map(|s| s.code.clone())
    }
}

#[async_trait]
impl CodeSender for RecordingCodeSender {
    async fn send_code(&self, user_id: Uuid, purpose: CodePurpose, code: &str) -> AppResult<()> {
        lock(&self.sent).push(SentCode {
            user_id,
            purpose,
            code: code.to_string(),
        });
        Ok(())
    }
}

// ── Store with an outage switch ────────────────────────────

/// Wraps the in-memory store and fails every call while switched off.
///
/// Writes to selected keys can also be slowed down to open race windows.
#[derive(Debug)]
pub struct SwitchableStore {
    inner: Arc<MemoryRevocationStore>,
    down: AtomicBool,
    slow_sets: Mutex<Option<(String, Duration)>>,
}

impl SwitchableStore {
    /// Wraps `inner`, initially up.
    pub fn new(inner: Arc<MemoryRevocationStore>) -> Self {
        Self {
            inner,
            down: AtomicBool::new(false),
            slow_sets: Mutex::new(None),
        }
    }

    /// Sleep for `delay` before every `set` on a key containing `pattern`.
    pub fn delay_sets_matching(&self, pattern: &str, delay: Duration) {
        *lock(&self.slow_sets) = Some((pattern.to_string(), delay));
    }

    /// Simulate an outage (`true`) or recovery (`false`).
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn up(&self) -> AppResult<&MemoryRevocationStore> {
        if self.down.load(Ordering::SeqCst) {
            Err(AppError::cache("Store unreachable"))
        } else {
            Ok(self.inner.as_ref())
        }
    }
}

#[async_trait]
impl RevocationStore for SwitchableStore {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        self.up()?.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()> {
        let delay = lock(&self.slow_sets)
            .as_ref()
            .filter(|(pattern, _)| key.contains(pattern.as_str()))
            .map(|(_, delay)| *delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.up()?.set(key, value, ttl).await
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> AppResult<bool> {
        self.up()?.set_nx(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> AppResult<bool> {
        self.up()?.delete(key).await
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        self.up()?.exists(key).await
    }

    async fn incr_window(&self, key: &str, window: Duration) -> AppResult<WindowCount> {
        self.up()?.incr_window(key, window).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> AppResult<bool> {
        self.up()?.expire(key, ttl).await
    }

    async fn ttl(&self, key: &str) -> AppResult<Option<Duration>> {
        self.up()?.ttl(key).await
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: &str,
        replacement: &str,
        ttl: Option<Duration>,
    ) -> AppResult<CompareAndSwapOutcome> {
        self.up()?
            .compare_and_swap(key, expected, replacement, ttl)
            .await
    }

    async fn take_if_equals(&self, key: &str, expected: &str) -> AppResult<bool> {
        self.up()?.take_if_equals(key, expected).await
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(self.up().is_ok())
    }

    fn provider_name(&self) -> &str {
        "switchable-memory"
    }
}

// ── Harness ────────────────────────────────────────────────

/// Every auth component wired over in-memory collaborators.
///
/// Derefs to [`AuthServices`], so `h.issuer`, `h.sessions` and friends are
/// available directly.
#[derive(Debug)]
pub struct Harness {
    /// Configuration the services were built from.
    pub config: AppConfig,
    /// Test clock shared by every component and the store.
    pub clock: Arc<ManualClock>,
    /// The underlying store, for inspection.
    pub store: Arc<MemoryRevocationStore>,
    /// The store the components actually talk to.
    pub switchable: Arc<SwitchableStore>,
    /// User directory fake.
    pub users: Arc<InMemoryUserDirectory>,
    /// MFA repository fake.
    pub mfa_repo: Arc<InMemoryMfaRepository>,
    /// Records delivered codes.
    pub sender: Arc<RecordingCodeSender>,
    /// Hasher used for accounts created by the harness.
    pub hasher: PasswordHasher,
    services: AuthServices,
}

impl Harness {
    /// Harness with default test configuration.
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Harness with a tweaked configuration.
    pub fn with_config(tweak: impl FnOnce(&mut AppConfig)) -> Self {
        let mut config = test_config();
        tweak(&mut config);

        let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default();
        let clock = Arc::new(ManualClock::new(start));
        let store = Arc::new(MemoryRevocationStore::new(clock.clone()));
        let switchable = Arc::new(SwitchableStore::new(Arc::clone(&store)));
        let users = Arc::new(InMemoryUserDirectory::new(clock.clone()));
        let mfa_repo = Arc::new(InMemoryMfaRepository::default());
        let sender = Arc::new(RecordingCodeSender::default());
        let hasher = cheap_hasher();

        let services = match AuthServices::new(
            &config,
            switchable.clone(),
            clock.clone(),
            users.clone(),
            mfa_repo.clone(),
            sender.clone(),
            hasher.clone(),
        ) {
            Ok(services) => services,
            Err(e) => panic!("test harness wiring failed: {e}"),
        };

        Self {
            config,
            clock,
            store,
            switchable,
            users,
            mfa_repo,
            sender,
            hasher,
            services,
        }
    }

    /// The wired services.
    pub fn services(&self) -> &AuthServices {
        &self.services
    }

    /// Simulate a store outage or recovery.
    pub fn set_store_down(&self, down: bool) {
        self.switchable.set_down(down);
    }

    /// Create an active member account with `{username}@example.com`.
    pub async fn create_user(&self, username: &str, password: &str) -> User {
        let hash = match self.hasher.hash_password(password) {
            Ok(hash) => hash,
            Err(e) => panic!("hashing failed: {e}"),
        };
        let created = self
            .users
            .create_user(&NewUser {
                username: username.to_string(),
                email: Some(format!("{username}@example.com")),
                password_hash: Some(hash),
                display_name: None,
                role: UserRole::Member,
            })
            .await;
        match created {
            Ok(user) => user,
            Err(e) => panic!("creating {username} failed: {e}"),
        }
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for Harness {
    type Target = AuthServices;

    fn deref(&self) -> &Self::Target {
        &self.services
    }
}
