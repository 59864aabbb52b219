// ============================
// authgate-lib/src/auth/session.rs
// ============================
//! Session token handling and management.
//!
//! Sessions live in a sharded concurrent map keyed by token. Every operation
//! on a given token happens under that token's shard lock, so a reader never
//! sees a half-built session and create/resolve/revoke never interleave.
//! Expiry is judged against the time the caller passes in; expired entries
//! are dropped lazily on access or by [`SessionStore::purge_expired`].
use super::token_generator::generate_secure_token;
use crate::metrics::{SESSION_ACTIVE, SESSION_CREATED, SESSION_EXPIRED, SESSION_REVOKED};
use authgate_common::Principal;
use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use metrics::{counter, gauge};
use std::sync::Arc;
use std::time::Duration;

/// A live session
#[derive(Debug, Clone)]
pub struct Session {
    pub principal: Principal,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// A session is dead once `now` passes its expiry
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Token to principal mapping with expiry
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    sessions: Arc<DashMap<String, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session for `principal` and return its token
    pub fn create(&self, principal: Principal, ttl: Duration, now: DateTime<Utc>) -> String {
        self.open(principal, ttl, now).0
    }

    /// Create a session, returning its token together with the stored record
    pub fn open(
        &self,
        principal: Principal,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> (String, Session) {
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let principal_id = principal.id;
        let session = Session {
            principal,
            created_at: now,
            expires_at,
        };
        let issued = session.clone();

        // A collision on 256 random bits is not expected, but a live token
        // must never be handed to a second principal.
        let token = loop {
            let candidate = generate_secure_token();
            if let Entry::Vacant(slot) = self.sessions.entry(candidate.clone()) {
                slot.insert(session);
                break candidate;
            }
        };

        tracing::debug!(principal = %principal_id, %expires_at, "session created");
        counter!(SESSION_CREATED).increment(1);
        gauge!(SESSION_ACTIVE).set(self.sessions.len() as f64);

        (token, issued)
    }

    /// Resolve a token to its principal
    ///
    /// Unknown, revoked and expired tokens all resolve to `None`.
    pub fn resolve(&self, token: &str, now: DateTime<Utc>) -> Option<Principal> {
        self.get(token, now).map(|session| session.principal)
    }

    /// Full session record for a live token
    pub fn get(&self, token: &str, now: DateTime<Utc>) -> Option<Session> {
        if let Some(session) = self.sessions.get(token) {
            if !session.is_expired(now) {
                return Some(session.clone());
            }
        } else {
            return None;
        }

        // Expired: purge it, re-checking under the shard write lock.
        if self
            .sessions
            .remove_if(token, |_, session| session.is_expired(now))
            .is_some()
        {
            tracing::debug!("expired session purged on access");
            counter!(SESSION_EXPIRED).increment(1);
            gauge!(SESSION_ACTIVE).set(self.sessions.len() as f64);
        }
        None
    }

    /// Revoke a token; unknown or already revoked tokens are a no-op
    pub fn revoke(&self, token: &str) {
        if let Some((_, session)) = self.sessions.remove(token) {
            tracing::debug!(principal = %session.principal.id, "session revoked");
            counter!(SESSION_REVOKED).increment(1);
            gauge!(SESSION_ACTIVE).set(self.sessions.len() as f64);
        }
    }

    /// Drop every session expired at `now`, returning how many were removed
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| !session.is_expired(now));
        let after = self.sessions.len();
        let removed = before.saturating_sub(after);

        if removed > 0 {
            tracing::info!(removed, remaining = after, "expired sessions swept");
            counter!(SESSION_EXPIRED).increment(removed as u64);
        }
        gauge!(SESSION_ACTIVE).set(after as f64);

        removed
    }

    /// Number of stored sessions, including expired ones not yet purged
    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }
}
