// ============================
// authgate-lib/src/auth/login.rs
// ============================
//! Credential checking and session issuance.
use super::{Clock, CredentialHasher, SessionStore, UserDirectory};
use crate::error::{AppError, AuthFailure};
use crate::metrics::{LOGIN_FAILED, LOGIN_SUCCEEDED};
use authgate_common::Principal;
use chrono::{DateTime, Utc};
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use zeroize::Zeroizing;

/// Hashed in place of a missing user's credential so unknown usernames cost
/// the same as wrong passwords.
const DUMMY_PASSWORD: &str = "authgate-dummy-password";

/// Result of a successful login
#[derive(Debug, Clone)]
pub struct LoginSuccess {
    pub token: String,
    pub principal: Principal,
    pub expires_at: DateTime<Utc>,
}

/// Validates submitted credentials and creates sessions
pub struct LoginHandler {
    directory: Arc<dyn UserDirectory>,
    hasher: CredentialHasher,
    sessions: SessionStore,
    clock: Arc<dyn Clock>,
    session_ttl: Duration,
    dummy_hash: String,
}

impl LoginHandler {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        hasher: CredentialHasher,
        sessions: SessionStore,
        clock: Arc<dyn Clock>,
        session_ttl: Duration,
    ) -> Result<Self, AppError> {
        let dummy_hash = hasher.hash(DUMMY_PASSWORD)?;
        Ok(Self {
            directory,
            hasher,
            sessions,
            clock,
            session_ttl,
            dummy_hash,
        })
    }

    /// Check `username`/`password` and open a session on success
    pub async fn attempt_login(
        &self,
        username: &str,
        password: Zeroizing<String>,
    ) -> Result<LoginSuccess, AuthFailure> {
        let credential = self.directory.find_credential_by_username(username).await;

        let (stored_hash, known) = match &credential {
            Some(credential) => (credential.password_hash.clone(), true),
            None => (self.dummy_hash.clone(), false),
        };

        let matched = self.verify_blocking(password, stored_hash).await && known;

        let credential = match credential {
            Some(credential) if matched => credential,
            _ => {
                // Same log line either way; which case it was is not recorded.
                tracing::info!(username = %username, "login rejected");
                counter!(LOGIN_FAILED).increment(1);
                return Err(AuthFailure::InvalidCredentials);
            },
        };

        let principal = credential.principal();
        let now = self.clock.now();
        let (token, session) = self
            .sessions
            .open(principal.clone(), self.session_ttl, now);

        tracing::info!(username = %username, principal = %principal.id, "login succeeded");
        counter!(LOGIN_SUCCEEDED).increment(1);

        Ok(LoginSuccess {
            token,
            principal,
            expires_at: session.expires_at,
        })
    }

    /// Session lifetime granted on login
    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    // Hashing is deliberately slow; keep it off the async workers.
    async fn verify_blocking(&self, password: Zeroizing<String>, hash: String) -> bool {
        let hasher = self.hasher.clone();
        match tokio::task::spawn_blocking(move || hasher.verify(&password, &hash)).await {
            Ok(matched) => matched,
            Err(err) => {
                tracing::error!(error = %err, "password verification task failed");
                false
            },
        }
    }
}
