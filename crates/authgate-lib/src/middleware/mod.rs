// crates/authgate-lib/src/middleware/mod.rs

//! Middleware for the gateway's HTTP surface.

pub mod auth;
pub mod cookies;
pub mod csrf;

pub use auth::{require_session, return_to, session_tokens, ClientAddr, CurrentPrincipal};
