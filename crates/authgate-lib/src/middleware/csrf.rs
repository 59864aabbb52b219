// ============================
// crates/authgate-lib/src/middleware/csrf.rs
// ============================
//! Double-submit CSRF tokens for the login and logout forms.
//!
//! The token lives in a `SameSite=Strict` cookie and is echoed back in a
//! hidden form field. A cross-site page can make the browser send the cookie
//! but cannot read it, so it cannot fill in the field.
use super::cookies::{cookie_value, set_cookie, SameSite};
use crate::auth::generate_secure_token;
use crate::error::AppError;
use axum::http::{HeaderMap, HeaderValue};
use serde::Deserialize;

/// Cookie carrying the token
pub const CSRF_COOKIE: &str = "XSRF-TOKEN";

/// Hidden form field carrying the token
pub const CSRF_FIELD: &str = "_csrf";

/// Shortest token accepted back from a cookie (128 bits, base64)
const MIN_TOKEN_LEN: usize = 22;

/// Token for a rendered form
#[derive(Debug, Clone)]
pub struct CsrfToken {
    pub token: String,
    /// Present when the client has to be given a new cookie
    pub set_cookie: Option<HeaderValue>,
}

/// Form body holding nothing but the token
#[derive(Debug, Default, Deserialize)]
pub struct CsrfForm {
    #[serde(rename = "_csrf", default)]
    pub csrf: Option<String>,
}

/// Reuse the client's token, or mint one
pub fn issue(headers: &HeaderMap, secure: bool) -> Result<CsrfToken, AppError> {
    match cookie_value(headers, CSRF_COOKIE).filter(|token| is_well_formed(token)) {
        Some(token) => Ok(CsrfToken {
            token: token.to_string(),
            set_cookie: None,
        }),
        None => rotate(secure),
    }
}

/// Always mint a fresh token
pub fn rotate(secure: bool) -> Result<CsrfToken, AppError> {
    let token = generate_secure_token();
    let cookie = set_cookie(CSRF_COOKIE, &token, None, SameSite::Strict, secure)?;
    Ok(CsrfToken {
        token,
        set_cookie: Some(cookie),
    })
}

/// Check the submitted field against the cookie
pub fn verify(headers: &HeaderMap, submitted: Option<&str>) -> Result<(), AppError> {
    let expected = cookie_value(headers, CSRF_COOKIE).filter(|token| is_well_formed(token));
    match (expected, submitted) {
        (Some(expected), Some(submitted))
            if constant_time_eq(expected.as_bytes(), submitted.as_bytes()) =>
        {
            Ok(())
        },
        _ => {
            tracing::warn!("form submission failed the CSRF check");
            Err(AppError::CsrfRejected)
        },
    }
}

fn is_well_formed(token: &str) -> bool {
    token.len() >= MIN_TOKEN_LEN
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |diff, (x, y)| diff | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;

    fn with_cookie(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("{CSRF_COOKIE}={token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn test_issue_reuses_cookie() {
        let token = generate_secure_token();
        let issued = issue(&with_cookie(&token), false).unwrap();
        assert_eq!(issued.token, token);
        assert!(issued.set_cookie.is_none());
    }

    #[test]
    fn test_issue_replaces_missing_or_junk_cookie() {
        let issued = issue(&HeaderMap::new(), false).unwrap();
        let cookie = issued.set_cookie.unwrap();
        assert!(cookie.to_str().unwrap().contains("SameSite=Strict"));

        let issued = issue(&with_cookie("short"), false).unwrap();
        assert_ne!(issued.token, "short");
        assert!(issued.set_cookie.is_some());
    }

    #[test]
    fn test_verify() {
        let token = generate_secure_token();
        let headers = with_cookie(&token);

        assert!(verify(&headers, Some(token.as_str())).is_ok());
        assert!(matches!(verify(&headers, None), Err(AppError::CsrfRejected)));
        assert!(matches!(
            verify(&headers, Some(generate_secure_token().as_str())),
            Err(AppError::CsrfRejected)
        ));
        assert!(matches!(
            verify(&HeaderMap::new(), Some(token.as_str())),
            Err(AppError::CsrfRejected)
        ));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"hello", b"hello"));
        assert!(!constant_time_eq(b"hello", b"world"));
        assert!(!constant_time_eq(b"short", b"longer"));
    }
}
