//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod app;
pub mod auth;
pub mod cache;
pub mod gate;
pub mod logging;
pub mod mfa;
pub mod rate_limit;

use serde::{Deserialize, Serialize};

pub use self::app::ServerConfig;
pub use self::auth::AuthConfig;
pub use self::cache::{CacheConfig, MemoryStoreConfig, RedisStoreConfig};
pub use self::gate::GateConfig;
pub use self::logging::LoggingConfig;
pub use self::mfa::MfaConfig;
pub use self::rate_limit::{RateLimitConfig, ScopeLimit};

use crate::error::AppError;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database connection settings.
    pub database: DatabaseConfig,
    /// Revocation store settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Token and credential settings.
    pub auth: AuthConfig,
    /// Per-scope rate limits.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Multi-factor authentication settings.
    #[serde(default)]
    pub mfa: MfaConfig,
    /// Authentication gate settings.
    #[serde(default)]
    pub gate: GateConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database connection pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    /// Idle connection timeout in seconds.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u64,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the default configuration with an environment-specific overlay
    /// and environment variables prefixed with `CLOUDBOX_`.
    pub fn load(env: &str) -> Result<Self, AppError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("CLOUDBOX")
                    .separator("__")
                    .try_parsing(true),
            );
        Self::from_builder(builder)
    }

    /// Build, deserialize and validate a prepared set of sources.
    ///
    /// There is no default signing secret, so one of the sources must
    /// supply `auth.jwt_secret`.
    pub fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, AppError> {
        let config: Self = builder
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;
        config.auth.validate()?;
        Ok(config)
    }
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    2
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_idle_timeout() -> u64 {
    300
}

#[cfg(test)]
mod tests {
    use config::{Config, File, FileFormat};

    use super::*;
    use crate::error::ErrorKind;

    const DEFAULTS: &str = include_str!("../../../../config/default.toml");

    fn defaults() -> config::ConfigBuilder<config::builder::DefaultState> {
        Config::builder().add_source(File::from_str(DEFAULTS, FileFormat::Toml))
    }

    #[test]
    fn test_defaults_alone_do_not_load() {
        let err = AppConfig::from_builder(defaults()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);
    }

    #[test]
    fn test_short_secret_rejected() {
        let builder = defaults().set_override("auth.jwt_secret", "too-short").unwrap();
        let err = AppConfig::from_builder(builder).unwrap_err();
        assert!(err.message.contains("jwt_secret"));
    }

    #[test]
    fn test_loads_with_supplied_secret() {
        let builder = defaults()
            .set_override("auth.jwt_secret", "an-operator-supplied-secret-of-40-bytes!")
            .unwrap();
        let config = AppConfig::from_builder(builder).unwrap();
        assert_eq!(config.auth.access_ttl_minutes, 15);
        assert_eq!(config.rate_limit.signup.max_requests, 5);
        assert!(config.server.trusted_proxies.is_empty());
    }
}
