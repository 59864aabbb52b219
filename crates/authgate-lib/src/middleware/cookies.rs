// ============================
// crates/authgate-lib/src/middleware/cookies.rs
// ============================
//! Cookie lookup and `Set-Cookie` construction.
use crate::error::AppError;
use axum::http::{header, HeaderMap, HeaderValue};
use std::fmt;

/// `SameSite` attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SameSite::Strict => write!(f, "Strict"),
            SameSite::Lax => write!(f, "Lax"),
        }
    }
}

/// Value of the first non-empty cookie called `name`
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value)
}

/// `Set-Cookie` value for an `HttpOnly` cookie scoped to `/`
///
/// Without `max_age_secs` the cookie lasts for the browser session.
pub fn set_cookie(
    name: &str,
    value: &str,
    max_age_secs: Option<u64>,
    same_site: SameSite,
    secure: bool,
) -> Result<HeaderValue, AppError> {
    let mut cookie = format!("{name}={value}; Path=/; HttpOnly; SameSite={same_site}");
    if let Some(max_age) = max_age_secs {
        cookie.push_str(&format!("; Max-Age={max_age}"));
    }
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
        .map_err(|e| AppError::Internal(format!("invalid `{name}` cookie: {e}")))
}

/// `Set-Cookie` value that deletes `name`
pub fn clear_cookie(name: &str, same_site: SameSite, secure: bool) -> Result<HeaderValue, AppError> {
    set_cookie(name, "", Some(0), same_site, secure)
}
