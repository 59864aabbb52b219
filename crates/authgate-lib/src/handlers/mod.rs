//! HTTP handlers behind the gateway.
pub mod login;
pub mod pages;
pub mod session;
