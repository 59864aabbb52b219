// ============================
// authgate-lib/src/config.rs
// ============================
//! Configuration management.
//!
//! Settings are layered: compiled-in defaults, then a TOML file, then
//! `AUTHGATE_`-prefixed environment variables (`__` separates nested keys,
//! e.g. `AUTHGATE_SESSION__TTL_SECS=600`). Everything is validated once at
//! startup; a bad setting never surfaces at request time.
use crate::auth::{CredentialHasher, HashAlgorithm};
use crate::error::AppError;
use crate::gateway::ChallengePolicy;
use crate::router::FIXED_ROUTES;
use crate::routes::{is_local_redirect, RouteClassifier, RouteRule};
use authgate_common::AccessPolicy;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

/// Config file looked up when no explicit path is given
pub const DEFAULT_CONFIG_FILE: &str = "authgate.toml";

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "AUTHGATE_";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Longest accepted login lockout (7 days)
const MAX_LOCKOUT_SECS: u64 = 7 * 24 * 60 * 60;

/// Longest accepted background sweep interval (1 day)
const MAX_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub log_level: String,
    pub session: SessionSettings,
    pub hashing: HashingSettings,
    pub login: LoginSettings,
    pub gateway: GatewaySettings,
    pub rate_limit: RateLimitSettings,
    /// Ordered route rules; the first matching pattern decides
    pub routes: Vec<RouteRule>,
    /// Users seeded into the in-memory directory
    pub users: Vec<UserSettings>,
}

/// Listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Session lifetime and cookie settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Session time to live in seconds
    pub ttl_secs: u64,
    /// Name of the cookie carrying the session token
    pub cookie_name: String,
    /// Mark the session cookie `Secure`
    pub secure_cookie: bool,
    /// Interval of the background sweep of expired sessions
    pub sweep_interval_secs: u64,
}

/// Password hashing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HashingSettings {
    /// Algorithm used for new hashes; verification accepts either
    pub algorithm: HashAlgorithm,
    pub scrypt: ScryptSettings,
    pub argon2: Argon2Settings,
}

/// scrypt work factor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScryptSettings {
    pub log_n: u8,
    pub r: u32,
    pub p: u32,
}

/// Argon2id work factor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Argon2Settings {
    /// Memory cost in KiB
    pub m_cost: u32,
    pub t_cost: u32,
    pub p_cost: u32,
}

/// Login entry point settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginSettings {
    /// Path serving the login form and accepting submissions
    pub path: String,
    /// Where a successful login is redirected
    pub success_redirect: String,
    /// Path accepting logout submissions
    pub logout_path: String,
}

/// Gateway behaviour settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    /// How unauthenticated requests to protected routes are answered
    pub challenge: ChallengePolicy,
}

/// Login throttling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    /// Failed attempts before a client is locked out
    pub max_attempts: u32,
    /// Lockout duration in seconds
    pub lockout_secs: u64,
    /// Interval of the background cleanup of stale entries
    pub cleanup_interval_secs: u64,
    /// Take the client address from `X-Real-IP` (only behind a trusted proxy)
    pub trust_proxy_headers: bool,
}

/// A user seeded into the in-memory directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSettings {
    pub username: String,
    /// PHC-format hash, e.g. from `authgate hash-password`
    pub password_hash: String,
    #[serde(default)]
    pub display_name: Option<String>,
    /// Stable principal id; generated at startup when absent
    #[serde(default)]
    pub id: Option<Uuid>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            log_level: "info".to_string(),
            session: SessionSettings::default(),
            hashing: HashingSettings::default(),
            login: LoginSettings::default(),
            gateway: GatewaySettings::default(),
            rate_limit: RateLimitSettings::default(),
            routes: vec![
                RouteRule::new("/oauth/**", AccessPolicy::Public),
                RouteRule::new("/health", AccessPolicy::Public),
            ],
            users: Vec::new(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ttl_secs: 30 * 60, // 30 minutes
            cookie_name: "SESSION".to_string(),
            secure_cookie: false,
            sweep_interval_secs: 15 * 60,
        }
    }
}

impl Default for HashingSettings {
    fn default() -> Self {
        Self {
            algorithm: HashAlgorithm::Scrypt,
            scrypt: ScryptSettings::default(),
            argon2: Argon2Settings::default(),
        }
    }
}

impl Default for ScryptSettings {
    fn default() -> Self {
        Self {
            log_n: 15,
            r: 8,
            p: 1,
        }
    }
}

impl Default for Argon2Settings {
    fn default() -> Self {
        Self {
            m_cost: 19 * 1024,
            t_cost: 2,
            p_cost: 1,
        }
    }
}

impl Default for LoginSettings {
    fn default() -> Self {
        Self {
            path: "/login".to_string(),
            success_redirect: "/".to_string(),
            logout_path: "/logout".to_string(),
        }
    }
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            challenge: ChallengePolicy::Negotiate,
        }
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lockout_secs: 5 * 60,
            cleanup_interval_secs: 60 * 60,
            trust_proxy_headers: false,
        }
    }
}

impl Settings {
    /// Load settings from `authgate.toml` (if present) and the environment
    pub fn load() -> Result<Self, AppError> {
        Self::from_figment(Self::figment().merge(Toml::file(DEFAULT_CONFIG_FILE)))
    }

    /// Load settings from an explicit config file plus the environment
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(AppError::Configuration(format!(
                "config file {} does not exist",
                path.display()
            )));
        }
        Self::from_figment(Self::figment().merge(Toml::file(path)))
    }

    fn figment() -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
    }

    fn from_figment(figment: Figment) -> Result<Self, AppError> {
        let settings: Settings = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check every invariant the running gateway relies on
    pub fn validate(&self) -> Result<(), AppError> {
        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return Err(AppError::Configuration(format!(
                "unknown log level `{}`",
                self.log_level
            )));
        }

        if self.session.ttl_secs == 0 {
            return Err(AppError::Configuration(
                "session.ttl_secs must be greater than zero".to_string(),
            ));
        }

        if self.session.cookie_name.is_empty()
            || !self
                .session
                .cookie_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(AppError::Configuration(format!(
                "invalid session cookie name `{}`",
                self.session.cookie_name
            )));
        }

        for (name, path) in [
            ("login.path", &self.login.path),
            ("login.success_redirect", &self.login.success_redirect),
            ("login.logout_path", &self.login.logout_path),
        ] {
            if !path.starts_with('/') {
                return Err(AppError::Configuration(format!(
                    "{name} must start with `/`, got `{path}`"
                )));
            }
        }

        if !is_local_redirect(&self.login.success_redirect) {
            return Err(AppError::Configuration(format!(
                "login.success_redirect must be a path on this server, got `{}`",
                self.login.success_redirect
            )));
        }

        for (name, path) in [
            ("login.path", &self.login.path),
            ("login.logout_path", &self.login.logout_path),
        ] {
            if !path
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '-' | '_' | '.' | '~'))
            {
                return Err(AppError::Configuration(format!(
                    "{name} must be a literal path, got `{path}`"
                )));
            }
            if FIXED_ROUTES.contains(&path.as_str()) {
                return Err(AppError::Configuration(format!(
                    "{name} `{path}` collides with a built-in route"
                )));
            }
        }

        if self.login.path == self.login.logout_path {
            return Err(AppError::Configuration(
                "login.path and login.logout_path must differ".to_string(),
            ));
        }

        if self.rate_limit.lockout_secs > MAX_LOCKOUT_SECS {
            return Err(AppError::Configuration(format!(
                "rate_limit.lockout_secs must be at most {MAX_LOCKOUT_SECS}"
            )));
        }

        for (name, secs) in [
            ("session.sweep_interval_secs", self.session.sweep_interval_secs),
            ("rate_limit.cleanup_interval_secs", self.rate_limit.cleanup_interval_secs),
        ] {
            if secs == 0 || secs > MAX_INTERVAL_SECS {
                return Err(AppError::Configuration(format!(
                    "{name} must be between 1 and {MAX_INTERVAL_SECS}, got {secs}"
                )));
            }
        }

        if self.rate_limit.max_attempts == 0 {
            return Err(AppError::Configuration(
                "rate_limit.max_attempts must be greater than zero".to_string(),
            ));
        }

        CredentialHasher::from_settings(&self.hashing)?;
        RouteClassifier::new(self.routes.clone())?;

        let mut seen = HashSet::new();
        for user in &self.users {
            if user.username.is_empty() {
                return Err(AppError::Configuration("empty username".to_string()));
            }
            if !seen.insert(user.username.as_str()) {
                return Err(AppError::Configuration(format!(
                    "duplicate user `{}`",
                    user.username
                )));
            }
            if !CredentialHasher::is_well_formed(&user.password_hash) {
                return Err(AppError::Configuration(format!(
                    "password_hash for user `{}` is not a valid PHC string",
                    user.username
                )));
            }
        }

        Ok(())
    }

    /// Session time to live
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session.ttl_secs)
    }

    /// Socket address string to bind
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod config_tests;
