// ================
// authgate-common/src/lib.rs
// ================
//! Common types shared by the gateway library and its binary.
//! This module defines the identity, credential and access-policy model.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque identifier of an authenticated actor
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(Uuid);

impl PrincipalId {
    /// Generate a fresh random identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PrincipalId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for PrincipalId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Identity of an authenticated actor
///
/// Created on successful login and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub display_name: String,
}

/// Stored login credential for a single user
///
/// `password_hash` is always a PHC string produced by the credential hasher;
/// raw passwords never appear here.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub username: String,
    pub password_hash: String,
    pub principal_id: PrincipalId,
    pub display_name: String,
}

impl Credential {
    /// The principal this credential authenticates as
    pub fn principal(&self) -> Principal {
        Principal {
            id: self.principal_id,
            display_name: self.display_name.clone(),
        }
    }
}

// Keep the hash out of logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password_hash", &"<redacted>")
            .field("principal_id", &self.principal_id)
            .field("display_name", &self.display_name)
            .finish()
    }
}

/// Access policy attached to a route
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessPolicy {
    /// Reachable without a session
    Public,
    /// Requires a live session
    Authenticated,
}

impl fmt::Display for AccessPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessPolicy::Public => f.write_str("public"),
            AccessPolicy::Authenticated => f.write_str("authenticated"),
        }
    }
}
