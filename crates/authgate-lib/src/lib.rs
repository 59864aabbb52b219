// ============================
// crates/authgate-lib/src/lib.rs
// ============================
//! Core of the `authgate` authentication gateway.
//!
//! The gateway classifies every request path as public or protected, resolves
//! the session token the client carries, and either forwards the request,
//! redirects the client to the login form, or answers 401.

pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod router;
pub mod routes;

use crate::auth::{
    AuthRateLimiter, Clock, CredentialHasher, InMemoryDirectory, LoginHandler, SessionStore,
    SystemClock, UserDirectory,
};
use crate::config::Settings;
use crate::error::AppError;
use crate::gateway::AuthGateway;
use crate::routes::RouteRule;
use authgate_common::AccessPolicy;
use std::sync::Arc;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Per-request authorization decision
    pub gateway: Arc<AuthGateway>,
    /// Credential checking and session issuance
    pub login: Arc<LoginHandler>,
    /// Session store (shared with the gateway and login handler)
    pub sessions: SessionStore,
    /// Configuration settings
    pub settings: Arc<Settings>,
    /// Failed-login throttle
    pub auth_rate_limiter: Arc<AuthRateLimiter>,
}

impl AppState {
    /// Assemble the gateway from settings and its collaborators
    pub fn new(
        settings: Settings,
        directory: Arc<dyn UserDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AppError> {
        settings.validate()?;

        let sessions = SessionStore::new();
        let hasher = CredentialHasher::from_settings(&settings.hashing)?;

        let gateway = AuthGateway::builder(sessions.clone())
            .login_path(settings.login.path.clone())
            // Logout must work with a stale or missing session.
            .rule(RouteRule::new(
                settings.login.logout_path.clone(),
                AccessPolicy::Public,
            ))
            .rules(settings.routes.iter().cloned())
            .challenge(settings.gateway.challenge)
            .clock(clock.clone())
            .build()?;

        let login = LoginHandler::new(
            directory,
            hasher,
            sessions.clone(),
            clock,
            settings.session_ttl(),
        )?;

        let auth_rate_limiter = AuthRateLimiter::from_settings(&settings.rate_limit);

        tracing::debug!(
            challenge = ?gateway.challenge_policy(),
            login_path = %gateway.login_path(),
            "gateway assembled"
        );

        Ok(Self {
            gateway: Arc::new(gateway),
            login: Arc::new(login),
            sessions,
            settings: Arc::new(settings),
            auth_rate_limiter: Arc::new(auth_rate_limiter),
        })
    }

    /// Assemble with the in-memory directory seeded from `settings.users`
    pub fn from_settings(settings: Settings) -> Result<Self, AppError> {
        let directory = InMemoryDirectory::from_settings(&settings.users)?;
        if directory.is_empty() {
            tracing::warn!("no users configured; every login will fail");
        }
        Self::new(settings, Arc::new(directory), Arc::new(SystemClock))
    }
}
